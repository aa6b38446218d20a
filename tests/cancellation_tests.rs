use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thread_orchestra::{CancellationToken, PoolError, ResultHandle, ShutdownMode, ThreadPoolExecutor};

fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,thread_orchestra=debug"));

    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

fn named_pool(pool_name: &str, thread_count: usize) -> ThreadPoolExecutor {
  ThreadPoolExecutor::builder()
    .name(pool_name)
    .thread_count(thread_count)
    .build()
    .unwrap()
}

// Submits a body that polls its token every 10ms until cancelled (or ~5s pass).
fn submit_polling_task(
  executor: &ThreadPoolExecutor,
  token: CancellationToken,
  started: Arc<AtomicBool>,
) -> ResultHandle<String> {
  executor.submit_with_token(
    move |token| {
      started.store(true, Ordering::SeqCst);
      for _ in 0..500 {
        token.throw_if_cancelled()?;
        thread::sleep(Duration::from_millis(10));
      }
      Ok("output_if_not_cancelled".to_string())
    },
    token,
  )
}

#[test]
fn test_token_clones_share_cancellation() {
  let token = CancellationToken::new();
  let clone = token.clone();
  assert!(!token.is_cancelled());
  assert!(clone.throw_if_cancelled().is_ok());

  clone.cancel();
  assert!(token.is_cancelled());
  assert!(matches!(token.throw_if_cancelled(), Err(PoolError::TaskCancelled)));

  // Monotonic and idempotent.
  token.cancel();
  assert!(clone.is_cancelled());
}

#[test]
fn test_token_cancellation_is_visible_across_threads() {
  let token = CancellationToken::new();
  let observer = {
    let token = token.clone();
    thread::spawn(move || {
      while !token.is_cancelled() {
        thread::sleep(Duration::from_millis(1));
      }
    })
  };
  thread::sleep(Duration::from_millis(20));
  token.cancel();
  observer.join().unwrap();
}

#[test]
fn test_child_token_follows_parent_only() {
  let parent = CancellationToken::new();
  let child = parent.child_token();
  child.cancel();
  assert!(!parent.is_cancelled(), "cancelling a child must not cancel its parent");

  let second_child = parent.child_token();
  parent.cancel();
  assert!(second_child.is_cancelled());
}

#[test]
fn test_already_cancelled_token_never_runs_body() {
  setup_tracing_for_test();
  let executor = named_pool("test_pool_does_not_run_if_cancelled", 2);
  let was_run = Arc::new(AtomicBool::new(false));
  let token = CancellationToken::new();
  token.cancel();

  let handle = {
    let was_run = was_run.clone();
    executor.submit_with_token(
      move |_token| {
        was_run.store(true, Ordering::SeqCst);
        Ok(true)
      },
      token,
    )
  };

  // Resolved immediately, never enqueued.
  assert!(handle.is_finished());
  assert_eq!(executor.outstanding_task_count(), 0);
  assert!(matches!(handle.get(), Err(PoolError::TaskCancelled)));

  executor.shutdown(ShutdownMode::Graceful);
  assert!(!was_run.load(Ordering::SeqCst));
}

#[test]
fn test_task_cooperative_cancellation_via_its_own_token() {
  setup_tracing_for_test();
  let executor = named_pool("test_pool_cooperative_cancel", 1);
  let token = CancellationToken::new();
  let started = Arc::new(AtomicBool::new(false));

  let handle = submit_polling_task(&executor, token.clone(), started.clone());

  while !started.load(Ordering::SeqCst) {
    thread::sleep(Duration::from_millis(5));
  }
  thread::sleep(Duration::from_millis(30));
  tracing::info!("Test: Cancelling token for task {}", handle.id());
  token.cancel();

  let result = handle.get();
  assert!(
    matches!(result, Err(PoolError::TaskCancelled)),
    "Expected TaskCancelled, got {:?}",
    result
  );
}

#[test]
fn test_body_that_ignores_token_runs_to_completion() {
  setup_tracing_for_test();
  let executor = named_pool("test_pool_ignored_token", 1);
  let token = CancellationToken::new();
  let started = Arc::new(AtomicBool::new(false));

  let handle = {
    let started = started.clone();
    executor.submit_with_token(
      move |_token| {
        started.store(true, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));
        Ok(5)
      },
      token.clone(),
    )
  };
  while !started.load(Ordering::SeqCst) {
    thread::sleep(Duration::from_millis(5));
  }
  token.cancel();

  assert_eq!(handle.get().unwrap(), 5);
}

#[test]
fn test_shared_token_cancels_every_task_using_it() {
  setup_tracing_for_test();
  let executor = named_pool("test_pool_shared_token", 3);
  let token = CancellationToken::new();

  let started: Vec<Arc<AtomicBool>> = (0..3).map(|_| Arc::new(AtomicBool::new(false))).collect();
  let handles: Vec<_> = started
    .iter()
    .map(|flag| submit_polling_task(&executor, token.clone(), flag.clone()))
    .collect();

  while !started.iter().all(|flag| flag.load(Ordering::SeqCst)) {
    thread::sleep(Duration::from_millis(5));
  }
  token.cancel();

  for handle in handles {
    assert!(handle.get().unwrap_err().is_cancelled());
  }
}

#[test]
fn test_cancel_all_signals_outstanding_tasks() {
  setup_tracing_for_test();
  let executor = named_pool("test_pool_cancel_all", 2);
  let caller_token = CancellationToken::new();
  let started = Arc::new(AtomicBool::new(false));

  let polling = submit_polling_task(&executor, caller_token.clone(), started.clone());
  while !started.load(Ordering::SeqCst) {
    thread::sleep(Duration::from_millis(5));
  }
  assert_eq!(executor.outstanding_task_count(), 1);

  executor.cancel_all();

  assert!(matches!(polling.get(), Err(PoolError::TaskCancelled)));
  assert!(
    !caller_token.is_cancelled(),
    "cancel_all cancels the task's own token, not the caller's"
  );
  assert_eq!(executor.outstanding_task_count(), 0);
}

#[test]
fn test_shutdown_forceful_cancels_active_and_queued_tasks() {
  setup_tracing_for_test();
  let executor = named_pool("test_pool_shutdown_forceful", 1);
  let started = Arc::new(AtomicBool::new(false));
  let queued_runs = Arc::new(AtomicUsize::new(0));

  let active = submit_polling_task(&executor, CancellationToken::new(), started.clone());
  let queued = {
    let queued_runs = queued_runs.clone();
    executor.submit_with_token(
      move |token| {
        queued_runs.fetch_add(1, Ordering::SeqCst);
        token.throw_if_cancelled()?;
        Ok("task_queued_finished".to_string())
      },
      CancellationToken::new(),
    )
  };
  while !started.load(Ordering::SeqCst) {
    thread::sleep(Duration::from_millis(5));
  }

  tracing::info!("Test: Initiating forceful shutdown.");
  executor.shutdown(ShutdownMode::ForcefulCancel);

  assert!(matches!(active.get(), Err(PoolError::TaskCancelled)));
  // Queued work is still dispatched during the drain, but sees its token cancelled.
  assert_eq!(queued_runs.load(Ordering::SeqCst), 1);
  assert!(matches!(queued.get(), Err(PoolError::TaskCancelled)));
}

use std::thread;
use std::time::Duration;
use thread_orchestra::{CancellationToken, PoolError, ShutdownMode, ThreadPoolExecutor};
use tracing::{info, warn};

// Works in 100ms steps and checks its token between steps.
fn example_task(id_str: &str, token: &CancellationToken, steps: u32) -> Result<String, PoolError> {
  info!("Task ({}) starting, {} steps of work.", id_str, steps);
  for step in 0..steps {
    if token.is_cancelled() {
      info!("Task ({}) observed cancellation at step {}.", id_str, step);
    }
    token.throw_if_cancelled()?;
    thread::sleep(Duration::from_millis(100));
  }
  let result = format!("Task ({}) finished normally.", id_str);
  info!("{}", result);
  Ok(result)
}

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Individual Cancellation Example ---");

  let executor = ThreadPoolExecutor::builder()
    .name("cancellation_pool")
    .thread_count(2)
    .build()
    .expect("Failed to start pool");

  let token_to_cancel = CancellationToken::new();
  let handle_to_cancel = executor.submit_with_token(
    |token| example_task("to_be_cancelled", &token, 50),
    token_to_cancel.clone(),
  );
  info!("Submitted task {} (intended for cancellation).", handle_to_cancel.id());

  let handle_to_complete =
    executor.submit_with_token(|token| example_task("to_complete", &token, 10), CancellationToken::new());
  info!("Submitted task {} (intended for completion).", handle_to_complete.id());

  // A token that is cancelled before submission never reaches a worker.
  let already_cancelled = CancellationToken::new();
  already_cancelled.cancel();
  let handle_never_run =
    executor.submit_with_token(|token| example_task("never_run", &token, 1), already_cancelled);

  info!("Waiting 500ms before cancelling task {}.", handle_to_cancel.id());
  thread::sleep(Duration::from_millis(500));
  token_to_cancel.cancel();

  for (label, handle) in [
    ("cancelled", handle_to_cancel),
    ("completing", handle_to_complete),
    ("pre-cancelled", handle_never_run),
  ] {
    let task_id = handle.id();
    match handle.get() {
      Ok(s) => info!("Task {} ({}) completed with SUCCESS: {:?}", task_id, label, s),
      Err(PoolError::TaskCancelled) => info!("Task {} ({}) resulted in PoolError::TaskCancelled.", task_id, label),
      Err(e) => warn!("Task {} ({}) resulted in unexpected PoolError: {:?}", task_id, label, e),
    }
  }

  info!("Shutting down pool.");
  executor.shutdown(ShutdownMode::Graceful);
  info!("Pool shutdown complete.");
  info!("--- Individual Cancellation Example End ---");
}

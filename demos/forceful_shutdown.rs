use std::thread;
use std::time::Duration;
use thread_orchestra::{CancellationToken, PoolError, ResultHandle, ShutdownMode, ThreadPoolExecutor};
use tracing::info;

fn long_running_interruptible_task(id: usize, token: &CancellationToken, duration_ms: u64) -> Result<String, PoolError> {
  info!("Task {} starting (potentially long: {}ms), checking for cancellation.", id, duration_ms);
  let mut elapsed_ms = 0;
  while elapsed_ms < duration_ms {
    token.throw_if_cancelled()?;
    thread::sleep(Duration::from_millis(50));
    elapsed_ms += 50;
  }
  let result = format!("Task {} completed NORMALLY after {}ms (should be rare in forceful shutdown)", id, duration_ms);
  info!("{}", result);
  Ok(result)
}

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Forceful Shutdown Example ---");

  let executor = ThreadPoolExecutor::builder()
    .name("forceful_shutdown_pool")
    .thread_count(2)
    .build()
    .expect("Failed to start pool");

  let mut handles: Vec<ResultHandle<String>> = Vec::new();

  // Submit 5 tasks, each "takes" 5 seconds.
  for i in 0..5 {
    let handle = executor.submit_with_token(
      move |token| long_running_interruptible_task(i, &token, 5000),
      CancellationToken::new(),
    );
    info!("Submitted task {} (handle id {})", i, handle.id());
    handles.push(handle);
  }

  thread::sleep(Duration::from_millis(200)); // Let tasks 0 and 1 start
  info!(
    "Queue size: {}, Active: {}. Initiating FORCEFUL shutdown...",
    executor.queued_task_count(),
    executor.active_task_count()
  );
  executor.shutdown(ShutdownMode::ForcefulCancel);
  info!("Pool shutdown call completed.");

  // Active tasks bail out at their next token check; queued ones bail out on their first.
  for handle in handles {
    let task_id = handle.id();
    match handle.get() {
      Ok(result) => info!("Task {} result (UNEXPECTED): {}", task_id, result),
      Err(PoolError::TaskCancelled) => info!("Task {} correctly cancelled.", task_id),
      Err(e) => info!("Task {} error: {:?}", task_id, e),
    }
  }

  info!("--- Forceful Shutdown Example End ---");
}

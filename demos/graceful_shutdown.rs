use std::thread;
use std::time::Duration;
use thread_orchestra::{ResultHandle, ShutdownMode, ThreadPoolExecutor};
use tracing::info;

fn work_task_fn(id: usize, duration_ms: u64) -> String {
  info!("Task {} starting (will run for {}ms)", id, duration_ms);
  thread::sleep(Duration::from_millis(duration_ms));
  let result = format!("Task {} finished after {}ms", id, duration_ms);
  info!("{}", result);
  result
}

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Graceful Shutdown Example ---");

  let executor = ThreadPoolExecutor::builder()
    .name("graceful_shutdown_pool")
    .thread_count(2)
    .build()
    .expect("Failed to start pool");

  let mut handles: Vec<ResultHandle<String>> = Vec::new();

  // Submit 5 tasks, each takes 1 second.
  // With 2 workers, tasks 0 and 1 start while 2, 3 and 4 wait in the queue.
  for i in 0..5 {
    let handle = executor.submit(move || work_task_fn(i, 1000));
    info!("Submitted task {} (handle id {})", i, handle.id());
    handles.push(handle);
  }

  thread::sleep(Duration::from_millis(100)); // Let some tasks start
  info!(
    "Queue size: {}, Active: {}. Initiating GRACEFUL shutdown...",
    executor.queued_task_count(),
    executor.active_task_count()
  );

  // Blocks until every task above ran, including the queued ones.
  executor.shutdown(ShutdownMode::Graceful);
  info!("Pool shutdown call completed.");

  for handle in handles {
    let task_id = handle.id();
    match handle.get() {
      Ok(result) => info!("Task {} result: {}", task_id, result),
      Err(e) => tracing::error!("Task {} error (UNEXPECTED after graceful drain): {:?}", task_id, e),
    }
  }

  info!("--- Graceful Shutdown Example End ---");
}

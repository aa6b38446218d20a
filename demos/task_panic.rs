use std::thread;
use std::time::Duration;
use thread_orchestra::{PoolError, ShutdownMode, ThreadPoolExecutor};
use tracing::info;

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Task Panic Example ---");

  let executor = ThreadPoolExecutor::builder()
    .name("panic_pool")
    .thread_count(1)
    .build()
    .expect("Failed to start pool");

  let handle = executor.submit(|| {
    info!("Panicking Task: Starting...");
    thread::sleep(Duration::from_millis(100));
    info!("Panicking Task: About to panic!");
    panic!("This task is designed to panic!");
    #[allow(unreachable_code)]
    "This will not be returned".to_string()
  });

  let task_id = handle.id(); // Get the ID before handle is consumed
  info!("Panicking task {} submitted. Waiting for result...", task_id);

  match handle.get() {
    Ok(result) => info!("Task {} completed with UNEXPECTED result: {}", task_id, result),
    Err(PoolError::TaskPanicked(message)) => {
      info!("Task {} correctly resulted in PoolError::TaskPanicked: {}", task_id, message);
    }
    Err(e) => info!("Task {} resulted in unexpected error: {:?}", task_id, e),
  }

  // The worker survived; the pool keeps serving tasks.
  let follow_up = executor.submit(|| "still alive".to_string());
  info!("Follow-up task result: {:?}", follow_up.get());

  info!("Shutting down pool.");
  executor.shutdown(ShutdownMode::Graceful);
  info!("Pool shutdown complete.");
  info!("--- Task Panic Example End ---");
}

use crate::cancellation::CancellationToken;
use crate::error::PoolError;
use crate::handle::{result_channel, ResultHandle};
use crate::pool::{WorkerPool, WorkerSettings};
use crate::task::Task;

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, error, info, trace, warn};

lazy_static::lazy_static! {
  static ref NEXT_POOL_TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// Worker count used when none is configured.
pub const DEFAULT_THREAD_COUNT: usize = 20;

const DEFAULT_POOL_NAME: &str = "thread_orchestra";

/// Defines how the pool should behave upon shutdown.
///
/// Both modes drain: every task already queued is still dispatched and the
/// call returns only after all workers exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
  /// Lets queued and active tasks run to completion untouched.
  Graceful,
  /// Cancels the token of every outstanding task first. Bodies that poll
  /// their token finish early with `PoolError::TaskCancelled`.
  ForcefulCancel,
}

/// Configures and starts a [`ThreadPoolExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutorBuilder {
  pool_name: String,
  settings: WorkerSettings,
}

impl ExecutorBuilder {
  pub fn new() -> Self {
    Self {
      pool_name: DEFAULT_POOL_NAME.to_string(),
      settings: WorkerSettings {
        thread_count: DEFAULT_THREAD_COUNT,
        queue_capacity: None,
        stack_size: None,
      },
    }
  }

  /// Name used in logs and as the worker thread name prefix.
  pub fn name(mut self, pool_name: impl Into<String>) -> Self {
    self.pool_name = pool_name.into();
    self
  }

  /// Number of worker threads. Zero is raised to one.
  pub fn thread_count(mut self, thread_count: usize) -> Self {
    self.settings.thread_count = thread_count;
    self
  }

  /// Maximum number of queued (not yet dispatched) tasks. `None` means
  /// unbounded. When the queue is full, submission blocks until a worker
  /// dequeues a task.
  pub fn queue_capacity(mut self, capacity: Option<usize>) -> Self {
    self.settings.queue_capacity = capacity;
    self
  }

  pub fn stack_size(mut self, stack_size: usize) -> Self {
    self.settings.stack_size = Some(stack_size);
    self
  }

  /// Spawns the worker threads.
  ///
  /// # Errors
  /// Returns `PoolError::WorkerSpawn` if the OS refuses to create a thread. Any
  /// workers already started are shut down before returning.
  pub fn build(mut self) -> Result<ThreadPoolExecutor, PoolError> {
    if self.settings.thread_count == 0 {
      warn!(pool_name = %self.pool_name, "Requested a pool with 0 threads. Using 1 worker instead.");
      self.settings.thread_count = 1;
    }
    let pool_name = Arc::new(self.pool_name);
    let pool = WorkerPool::spawn(pool_name.clone(), &self.settings)?;
    Ok(ThreadPoolExecutor {
      pool_name,
      thread_count: self.settings.thread_count,
      pool,
      outstanding_tasks: Arc::new(DashMap::new()),
    })
  }
}

impl Default for ExecutorBuilder {
  fn default() -> Self {
    Self::new()
  }
}

/// A fixed-size pool of worker threads that runs submitted closures and hands
/// back a typed [`ResultHandle`] for each of them.
///
/// Dropping the executor drains the queue and joins every worker, blocking
/// until all previously submitted tasks have finished.
#[derive(Debug)]
pub struct ThreadPoolExecutor {
  pool_name: Arc<String>,
  thread_count: usize,
  pool: WorkerPool,
  outstanding_tasks: Arc<DashMap<u64, CancellationToken>>,
}

impl ThreadPoolExecutor {
  /// Starts an executor with `thread_count` workers and default settings.
  pub fn new(thread_count: usize) -> Result<Self, PoolError> {
    Self::builder().thread_count(thread_count).build()
  }

  pub fn builder() -> ExecutorBuilder {
    ExecutorBuilder::new()
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  /// Number of workers this executor was started with.
  pub fn thread_count(&self) -> usize {
    self.thread_count
  }

  /// Number of worker threads still live (not yet joined).
  pub fn running_thread_count(&self) -> usize {
    self.pool.running_thread_count()
  }

  /// Number of tasks currently executing on a worker.
  pub fn active_task_count(&self) -> usize {
    self.pool.active_task_count()
  }

  /// Returns the current number of tasks in the pending queue.
  pub fn queued_task_count(&self) -> usize {
    self.pool.queued_task_count()
  }

  /// Number of tasks submitted and not yet finished (queued or running).
  pub fn outstanding_task_count(&self) -> usize {
    self.outstanding_tasks.len()
  }

  /// Runs `task` on a worker thread.
  ///
  /// A panic inside `task` resolves the handle with `PoolError::TaskPanicked`.
  pub fn submit<T, F>(&self, task: F) -> ResultHandle<T>
  where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
  {
    self.submit_with_token(move |_token| Ok(task()), CancellationToken::new())
  }

  /// Runs `task` on a worker thread, handing it a token tied to `token`.
  ///
  /// If `token` is already cancelled the task is never enqueued and the
  /// returned handle is resolved with `PoolError::TaskCancelled`. Otherwise
  /// cancellation is cooperative: the body polls its token (for example with
  /// `throw_if_cancelled()?`) and decides when to stop.
  pub fn submit_with_token<T, F>(&self, task: F, token: CancellationToken) -> ResultHandle<T>
  where
    T: Send + 'static,
    F: FnOnce(CancellationToken) -> Result<T, PoolError> + Send + 'static,
  {
    let task_id = NEXT_POOL_TASK_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);

    if let Err(cancelled) = token.throw_if_cancelled() {
      debug!(pool_name = %self.pool_name, %task_id, "Token already cancelled at submission. Task will not be enqueued.");
      return ResultHandle::resolved(task_id, Err(cancelled));
    }

    // The child follows `token` but can also be cancelled by `cancel_all` on its own.
    let task_token = token.child_token();
    self.outstanding_tasks.insert(task_id, task_token.clone());

    let (result_writer, handle) = result_channel::<T>(task_id);
    let outstanding_tasks = self.outstanding_tasks.clone();
    let pool_name = self.pool_name.clone();

    let job = Box::new(move || {
      let outcome = match catch_unwind(AssertUnwindSafe(move || task(task_token))) {
        Ok(Ok(value)) => {
          trace!(pool_name = %*pool_name, %task_id, "Task executed successfully.");
          Ok(value)
        }
        Ok(Err(task_error)) => {
          debug!(pool_name = %*pool_name, %task_id, "Task finished with error: {}", task_error);
          Err(task_error)
        }
        Err(panic_payload) => {
          let message = panic_message(panic_payload.as_ref());
          error!(pool_name = %*pool_name, %task_id, "Task panicked during execution: {}", message);
          Err(PoolError::TaskPanicked(message))
        }
      };
      outstanding_tasks.remove(&task_id);
      result_writer.complete(outcome);
    });

    debug!(pool_name = %self.pool_name, %task_id, "Submitting task to queue.");
    if let Err(submit_error) = self.pool.dispatch(Task::new(task_id, job)) {
      // The rejected task is dropped with its writer, which resolves the handle.
      error!(pool_name = %self.pool_name, %task_id, "Submit: Failed to enqueue task: {}", submit_error);
      self.outstanding_tasks.remove(&task_id);
    }
    handle
  }

  /// Requests cancellation of every outstanding task. Tasks must cooperatively
  /// check their token for this to have an effect.
  pub fn cancel_all(&self) {
    info!(
      pool_name = %self.pool_name,
      outstanding = self.outstanding_tasks.len(),
      "Requesting cancellation for all outstanding tasks."
    );
    for entry in self.outstanding_tasks.iter() {
      let (task_id, token) = entry.pair();
      debug!(pool_name = %self.pool_name, %task_id, "Signaling cancellation for outstanding task.");
      token.cancel();
    }
  }

  /// Shuts the pool down and blocks until every worker has exited.
  pub fn shutdown(mut self, mode: ShutdownMode) {
    info!(pool_name = %self.pool_name, "Initiating explicit pool shutdown (mode: {:?}).", mode);
    if mode == ShutdownMode::ForcefulCancel {
      self.cancel_all();
    }
    self.pool.shutdown();
  }
}

impl Drop for ThreadPoolExecutor {
  fn drop(&mut self) {
    if self.pool.running_thread_count() > 0 {
      info!(
        pool_name = %*self.pool_name,
        "ThreadPoolExecutor dropped. Initiating implicit drain-then-join shutdown."
      );
      self.pool.shutdown();
    } else {
      trace!(pool_name = %*self.pool_name, "Drop: Shutdown already completed.");
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    (*message).to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic payload".to_string()
  }
}

use crate::error::PoolError;
use crate::task::Task;
use crate::task_queue::{QueueMessage, TaskQueue};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, info_span, trace, trace_span, warn};

/// Thread settings applied to every worker of a pool.
#[derive(Debug, Clone)]
pub(crate) struct WorkerSettings {
  pub(crate) thread_count: usize,
  pub(crate) queue_capacity: Option<usize>,
  pub(crate) stack_size: Option<usize>,
}

/// A fixed set of OS threads draining one shared [`TaskQueue`].
///
/// Workers are spawned on construction and joined by [`WorkerPool::shutdown`]
/// (or on drop). The pool only dispatches tasks; result typing and
/// cancellation live inside each task's closure.
#[derive(Debug)]
pub(crate) struct WorkerPool {
  pool_name: Arc<String>,
  queue: Arc<TaskQueue>,
  workers: Vec<JoinHandle<()>>,
  active_tasks: Arc<AtomicUsize>,
}

impl WorkerPool {
  pub(crate) fn spawn(pool_name: Arc<String>, settings: &WorkerSettings) -> Result<Self, PoolError> {
    let mut pool = Self {
      pool_name,
      queue: Arc::new(TaskQueue::new(settings.queue_capacity)),
      workers: Vec::with_capacity(settings.thread_count),
      active_tasks: Arc::new(AtomicUsize::new(0)),
    };

    for worker_id in 0..settings.thread_count {
      let worker_pool_name = pool.pool_name.clone();
      let worker_queue = pool.queue.clone();
      let worker_active_tasks = pool.active_tasks.clone();

      let mut builder = thread::Builder::new().name(format!("{}-worker-{}", pool.pool_name, worker_id));
      if let Some(stack_size) = settings.stack_size {
        builder = builder.stack_size(stack_size);
      }

      let spawn_result = builder.spawn(move || {
        Self::run_worker_loop(worker_pool_name, worker_id, worker_queue, worker_active_tasks);
      });

      match spawn_result {
        Ok(handle) => pool.workers.push(handle),
        Err(spawn_error) => {
          error!(
            pool_name = %pool.pool_name,
            worker_id,
            "Failed to spawn worker thread: {}. Tearing down the {} workers already started.",
            spawn_error,
            pool.workers.len()
          );
          pool.shutdown();
          return Err(PoolError::WorkerSpawn(spawn_error.to_string()));
        }
      }
    }

    info!(pool_name = %pool.pool_name, workers = pool.workers.len(), "Worker pool started.");
    Ok(pool)
  }

  /// Enqueues a task; one idle worker (if any) is woken to run it.
  pub(crate) fn dispatch(&self, task: Task) -> Result<(), PoolError> {
    self.queue.push(task)
  }

  /// Number of worker threads that have not been joined yet.
  pub(crate) fn running_thread_count(&self) -> usize {
    self.workers.len()
  }

  pub(crate) fn active_task_count(&self) -> usize {
    self.active_tasks.load(Ordering::Acquire)
  }

  pub(crate) fn queued_task_count(&self) -> usize {
    self.queue.len()
  }

  /// Drain-then-join shutdown: pushes one termination marker per worker behind
  /// every queued task and blocks until all workers have exited.
  ///
  /// Idempotent. A worker that is the calling thread (the pool was dropped from
  /// inside one of its own tasks) is detached instead of joined.
  pub(crate) fn shutdown(&mut self) {
    if self.workers.is_empty() {
      trace!(pool_name = %self.pool_name, "Shutdown: No workers left to join.");
      return;
    }

    info!(
      pool_name = %self.pool_name,
      workers = self.workers.len(),
      queued_tasks = self.queue.len(),
      "Initiating drain-then-join shutdown."
    );
    self.queue.close_with_termination_markers(self.workers.len());

    let current_thread = thread::current().id();
    for handle in self.workers.drain(..) {
      let worker_name = handle.thread().name().unwrap_or("<unnamed>").to_string();
      if handle.thread().id() == current_thread {
        warn!(
          pool_name = %self.pool_name,
          worker = %worker_name,
          "Shutdown requested from a pool worker. Detaching it instead of joining itself."
        );
        continue;
      }
      match handle.join() {
        Ok(()) => trace!(pool_name = %self.pool_name, worker = %worker_name, "Worker joined."),
        Err(_) => error!(pool_name = %self.pool_name, worker = %worker_name, "Worker thread panicked outside of a task."),
      }
    }

    info!(pool_name = %self.pool_name, "All workers joined. Pool shutdown complete.");
  }

  fn run_worker_loop(
    pool_name: Arc<String>,
    worker_id: usize,
    queue: Arc<TaskQueue>,
    active_tasks: Arc<AtomicUsize>,
  ) {
    let _worker_span = info_span!("pool_worker", pool_name = %pool_name, worker_id).entered();
    debug!("Worker loop started.");

    loop {
      match queue.pop_blocking() {
        QueueMessage::Run(task) => {
          let task_id = task.task_id;
          active_tasks.fetch_add(1, Ordering::AcqRel);
          trace!(%task_id, "Dequeued task. Executing.");
          {
            let _task_span = trace_span!("pool_task", %task_id).entered();
            task.run();
          }
          active_tasks.fetch_sub(1, Ordering::AcqRel);
          trace!(%task_id, "Task finished. Worker idle.");
        }
        QueueMessage::Terminate => {
          debug!("Termination marker received. Worker loop terminating.");
          break;
        }
      }
    }
  }
}

impl Drop for WorkerPool {
  fn drop(&mut self) {
    self.shutdown();
  }
}

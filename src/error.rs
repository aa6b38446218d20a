use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur within the `thread_orchestra` pool.
///
/// `ResultHandle::get` is the only place task outcomes surface, so callers can
/// branch on [`PoolError::TaskCancelled`] separately from task failures.
#[derive(Error, Debug, Clone)]
pub enum PoolError {
  #[error("Task was cancelled")]
  TaskCancelled,

  #[error("Task failed: {0}")]
  TaskFailed(#[source] Arc<dyn StdError + Send + Sync + 'static>),

  #[error("Submitted task panicked: {0}")]
  TaskPanicked(String),

  #[error("Task result writer was dropped before a result was stored")]
  ResultAbandoned,

  #[error("Task result already taken")]
  ResultUnavailable,

  #[error("Failed to spawn pool worker thread: {0}")]
  WorkerSpawn(String),

  #[error("Pool is shutting down or already shut down, cannot accept new tasks")]
  PoolShuttingDown,
}

impl PoolError {
  /// Wraps an arbitrary error raised by a task body as [`PoolError::TaskFailed`].
  pub fn failed<E>(err: E) -> Self
  where
    E: StdError + Send + Sync + 'static,
  {
    PoolError::TaskFailed(Arc::new(err))
  }

  /// Returns `true` when the task was cancelled rather than failing.
  pub fn is_cancelled(&self) -> bool {
    matches!(self, PoolError::TaskCancelled)
  }

  /// Returns `true` when the task body itself failed or panicked.
  pub fn is_task_failure(&self) -> bool {
    matches!(self, PoolError::TaskFailed(_) | PoolError::TaskPanicked(_))
  }
}

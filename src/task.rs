use std::fmt;

/// The type-erased body the pool executes. Result typing lives entirely inside
/// the closure, which owns the writer half of its `ResultHandle`.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Internal representation of a task managed by the pool.
pub(crate) struct Task {
  pub(crate) task_id: u64,
  pub(crate) job: Job,
}

impl Task {
  pub(crate) fn new(task_id: u64, job: Job) -> Self {
    Self { task_id, job }
  }

  pub(crate) fn run(self) {
    (self.job)()
  }
}

impl fmt::Debug for Task {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Task").field("task_id", &self.task_id).finish_non_exhaustive()
  }
}

use crate::error::PoolError;
use crate::task::Task;

use std::collections::VecDeque;
use std::fmt;

use parking_lot::{Condvar, Mutex};

/// An entry of the shared task queue.
///
/// `Terminate` is only ever pushed by the pool during shutdown and tells the
/// worker that dequeues it to leave its loop. It never reaches user code.
#[derive(Debug)]
pub(crate) enum QueueMessage {
  Run(Task),
  Terminate,
}

#[derive(Debug, Default)]
struct QueueState {
  entries: VecDeque<QueueMessage>,
  /// Number of `Run` entries in `entries`.
  queued_tasks: usize,
  closed: bool,
}

/// A FIFO queue of type-erased tasks shared by every worker of a pool.
///
/// Insertion order is dispatch order. With a capacity set, `push` blocks until
/// a worker dequeues an earlier task ("hold-until-dequeue"); termination
/// markers never count against the capacity.
pub(crate) struct TaskQueue {
  state: Mutex<QueueState>,
  not_empty: Condvar,
  not_full: Condvar,
  capacity: Option<usize>,
}

impl fmt::Debug for TaskQueue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TaskQueue")
      .field("len", &self.len())
      .field("capacity", &self.capacity)
      .finish_non_exhaustive()
  }
}

impl TaskQueue {
  /// Creates a queue. `None` means unbounded; a zero capacity is treated as 1.
  pub(crate) fn new(capacity: Option<usize>) -> Self {
    Self {
      state: Mutex::new(QueueState::default()),
      not_empty: Condvar::new(),
      not_full: Condvar::new(),
      capacity: capacity.map(|c| c.max(1)),
    }
  }

  /// Appends `task` to the tail and wakes one waiting worker.
  ///
  /// Blocks while a bounded queue is full. Fails with `PoolShuttingDown` once
  /// the queue was closed; the task is dropped in that case.
  pub(crate) fn push(&self, task: Task) -> Result<(), PoolError> {
    let mut state = self.state.lock();
    loop {
      if state.closed {
        return Err(PoolError::PoolShuttingDown);
      }
      match self.capacity {
        Some(capacity) if state.queued_tasks >= capacity => self.not_full.wait(&mut state),
        _ => break,
      }
    }
    state.entries.push_back(QueueMessage::Run(task));
    state.queued_tasks += 1;
    drop(state);
    self.not_empty.notify_one();
    Ok(())
  }

  /// Suspends until the queue is non-empty, then removes and returns its head.
  pub(crate) fn pop_blocking(&self) -> QueueMessage {
    let mut state = self.state.lock();
    loop {
      if let Some(message) = state.entries.pop_front() {
        if matches!(message, QueueMessage::Run(_)) {
          state.queued_tasks -= 1;
          drop(state);
          self.not_full.notify_one();
        }
        return message;
      }
      self.not_empty.wait(&mut state);
    }
  }

  /// Closes the queue to new tasks and appends `workers` termination markers
  /// behind everything already queued, then wakes every waiter.
  ///
  /// Tasks ahead of the markers are still dispatched, so each worker drains
  /// its share of the queue before it observes its marker.
  pub(crate) fn close_with_termination_markers(&self, workers: usize) {
    {
      let mut state = self.state.lock();
      state.closed = true;
      for _ in 0..workers {
        state.entries.push_back(QueueMessage::Terminate);
      }
    }
    self.not_empty.notify_all();
    self.not_full.notify_all();
  }

  /// Returns the number of user tasks waiting to be dispatched.
  pub(crate) fn len(&self) -> usize {
    self.state.lock().queued_tasks
  }
}

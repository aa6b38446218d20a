use crate::error::PoolError;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::task::AtomicWaker;
use parking_lot::{Condvar, Mutex};
use tracing::{trace, warn};

/// Lifecycle of a task's result slot. Leaves `Pending` exactly once.
enum SlotState<T> {
  Pending,
  Complete(Result<T, PoolError>),
  Taken,
}

impl<T> SlotState<T> {
  fn is_pending(&self) -> bool {
    matches!(self, SlotState::Pending)
  }
}

struct ResultSlot<T> {
  state: Mutex<SlotState<T>>,
  ready: Condvar,
  waker: AtomicWaker,
}

impl<T> ResultSlot<T> {
  fn new(state: SlotState<T>) -> Arc<Self> {
    Arc::new(Self {
      state: Mutex::new(state),
      ready: Condvar::new(),
      waker: AtomicWaker::new(),
    })
  }

  fn store(&self, outcome: Result<T, PoolError>) {
    {
      let mut state = self.state.lock();
      debug_assert!(state.is_pending(), "result slot written twice");
      *state = SlotState::Complete(outcome);
    }
    self.ready.notify_all();
    self.waker.wake();
  }
}

/// Write capability for a task's result. There is exactly one writer per
/// handle and [`ResultWriter::complete`] consumes it, so a slot can never be
/// written twice.
pub(crate) struct ResultWriter<T> {
  task_id: u64,
  slot: Option<Arc<ResultSlot<T>>>,
}

impl<T> ResultWriter<T> {
  pub(crate) fn complete(mut self, outcome: Result<T, PoolError>) {
    if let Some(slot) = self.slot.take() {
      trace!(task_id = %self.task_id, ok = outcome.is_ok(), "Storing task outcome.");
      slot.store(outcome);
    }
  }
}

impl<T> Drop for ResultWriter<T> {
  fn drop(&mut self) {
    if let Some(slot) = self.slot.take() {
      warn!(task_id = %self.task_id, "Result writer dropped without storing an outcome. Resolving handle as abandoned.");
      slot.store(Err(PoolError::ResultAbandoned));
    }
  }
}

/// Creates a connected writer/handle pair for the task `task_id`.
pub(crate) fn result_channel<T>(task_id: u64) -> (ResultWriter<T>, ResultHandle<T>) {
  let slot = ResultSlot::new(SlotState::Pending);
  (
    ResultWriter {
      task_id,
      slot: Some(slot.clone()),
    },
    ResultHandle { task_id, slot },
  )
}

/// A handle to a task submitted to the `ThreadPoolExecutor`.
///
/// Resolves exactly once to the task's value, its failure, or
/// [`PoolError::TaskCancelled`]. The result can be retrieved by blocking with
/// [`get`](ResultHandle::get) or by `.await`ing the handle from async code.
pub struct ResultHandle<T> {
  task_id: u64,
  slot: Arc<ResultSlot<T>>,
}

impl<T> ResultHandle<T> {
  /// Builds a handle that is already resolved, e.g. for work rejected at submission.
  pub(crate) fn resolved(task_id: u64, outcome: Result<T, PoolError>) -> Self {
    Self {
      task_id,
      slot: ResultSlot::new(SlotState::Complete(outcome)),
    }
  }

  /// Returns the unique ID of this task.
  pub fn id(&self) -> u64 {
    self.task_id
  }

  /// Returns `true` once the task reached a terminal state. Never blocks on the task.
  pub fn is_finished(&self) -> bool {
    !self.slot.state.lock().is_pending()
  }

  /// Blocks until the task reached a terminal state without taking the result.
  pub fn wait(&self) {
    let mut state = self.slot.state.lock();
    while state.is_pending() {
      self.slot.ready.wait(&mut state);
    }
  }

  /// Like [`wait`](ResultHandle::wait) but gives up after `timeout`.
  /// Returns `true` if the task finished in time.
  pub fn wait_timeout(&self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut state = self.slot.state.lock();
    while state.is_pending() {
      if self.slot.ready.wait_until(&mut state, deadline).timed_out() {
        return !state.is_pending();
      }
    }
    true
  }

  /// Blocks until the task finished and returns its result.
  ///
  /// # Errors
  /// Returns `PoolError::TaskCancelled` if the task was cancelled before dispatch or bailed out on its token.
  /// Returns `PoolError::TaskFailed` if the task body returned an error.
  /// Returns `PoolError::TaskPanicked` if the task body panicked.
  pub fn get(self) -> Result<T, PoolError> {
    self.wait();
    self.take()
  }

  /// Waits at most `timeout` for the result. On timeout the handle is given back
  /// so the caller can keep waiting later.
  pub fn get_timeout(self, timeout: Duration) -> Result<Result<T, PoolError>, Self> {
    if self.wait_timeout(timeout) {
      Ok(self.take())
    } else {
      Err(self)
    }
  }

  fn take(&self) -> Result<T, PoolError> {
    let mut state = self.slot.state.lock();
    match std::mem::replace(&mut *state, SlotState::Taken) {
      SlotState::Complete(outcome) => outcome,
      SlotState::Taken => Err(PoolError::ResultUnavailable),
      SlotState::Pending => {
        *state = SlotState::Pending;
        Err(PoolError::ResultUnavailable)
      }
    }
  }
}

impl<T> Future for ResultHandle<T> {
  type Output = Result<T, PoolError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    if self.is_finished() {
      return Poll::Ready(self.take());
    }
    self.slot.waker.register(cx.waker());
    // Re-check: the writer may have stored the outcome before the waker was registered.
    if self.is_finished() {
      Poll::Ready(self.take())
    } else {
      Poll::Pending
    }
  }
}

impl<T> fmt::Debug for ResultHandle<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResultHandle")
      .field("task_id", &self.task_id)
      .field("finished", &self.is_finished())
      .finish_non_exhaustive()
  }
}

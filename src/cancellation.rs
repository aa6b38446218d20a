use crate::error::PoolError;

use tokio_util::sync::{CancellationToken as InnerToken, WaitForCancellationFuture};

/// A shareable, monotonic cancellation signal.
///
/// Clones share the same underlying state: cancelling through any clone is
/// observed by every other clone. Once cancelled a token stays cancelled.
/// Task bodies poll it cooperatively; the pool never interrupts running work.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
  inner: InnerToken,
}

impl CancellationToken {
  /// Creates a fresh, not-cancelled token.
  pub fn new() -> Self {
    Self {
      inner: InnerToken::new(),
    }
  }

  /// Creates a token that is cancelled together with `self`, but whose own
  /// cancellation does not propagate back to `self`.
  pub fn child_token(&self) -> Self {
    Self {
      inner: self.inner.child_token(),
    }
  }

  /// Requests cancellation. Idempotent.
  pub fn cancel(&self) {
    self.inner.cancel();
  }

  pub fn is_cancelled(&self) -> bool {
    self.inner.is_cancelled()
  }

  /// Fails with [`PoolError::TaskCancelled`] once cancellation was requested.
  ///
  /// Intended for use with `?` inside task bodies:
  ///
  /// ```
  /// # use thread_orchestra::{CancellationToken, PoolError};
  /// fn step(token: &CancellationToken) -> Result<u32, PoolError> {
  ///   token.throw_if_cancelled()?;
  ///   Ok(42)
  /// }
  /// let token = CancellationToken::new();
  /// assert_eq!(step(&token).unwrap(), 42);
  /// token.cancel();
  /// assert!(step(&token).unwrap_err().is_cancelled());
  /// ```
  pub fn throw_if_cancelled(&self) -> Result<(), PoolError> {
    if self.is_cancelled() {
      Err(PoolError::TaskCancelled)
    } else {
      Ok(())
    }
  }

  /// Resolves once the token is cancelled. Useful when bridging into async code.
  pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
    self.inner.cancelled()
  }
}

impl From<InnerToken> for CancellationToken {
  fn from(inner: InnerToken) -> Self {
    Self { inner }
  }
}

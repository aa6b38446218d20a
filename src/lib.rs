//! A fixed-size thread pool that runs closures on worker threads and hands
//! back typed result handles, with cooperative cancellation and
//! drain-then-join shutdown.
//!
//! ```
//! use thread_orchestra::{CancellationToken, PoolError, ThreadPoolExecutor};
//!
//! let executor = ThreadPoolExecutor::new(4)?;
//! assert_eq!(executor.submit(|| 1 + 2 + 3).get()?, 6);
//!
//! let token = CancellationToken::new();
//! token.cancel();
//! let handle = executor.submit_with_token(|_token| Ok("never runs"), token);
//! assert!(handle.get().unwrap_err().is_cancelled());
//! # Ok::<(), PoolError>(())
//! ```

mod cancellation;
mod error;
mod executor;
mod handle;
mod pool;
mod task;
mod task_queue;

pub use cancellation::CancellationToken;
pub use error::PoolError;
pub use executor::{ExecutorBuilder, ShutdownMode, ThreadPoolExecutor, DEFAULT_THREAD_COUNT};
pub use handle::ResultHandle;

//! Retry execution engine with policy-based configuration
//!
//! Used for whole-operation retries such as fetching the staged self-update
//! binary. Per-file download retries in the transfer engine re-queue items
//! instead, but take their delays from the same [`calculate_delay`].
//!
//! # Example
//!
//! ```rust,no_run
//! use mirrorsync_core::retry::{retry_with_policy, RetryError};
//! use mirrorsync_core::types::RetryPolicy;
//!
//! async fn example() -> Result<String, RetryError<std::io::Error>> {
//!     let policy = RetryPolicy::default();
//!
//!     retry_with_policy(&policy, || async {
//!         Ok("success".to_string())
//!     }).await
//! }
//! ```

mod error;
mod executor;
mod observer;
mod strategies;

pub use error::RetryError;
pub use executor::{retry_with_policy, RetryExecutor};
pub use observer::{NoOpObserver, RetryObserver, TracingObserver};
pub use strategies::{calculate_delay, AlwaysRetry, ClosurePredicate, RetryPredicate};

//! Delay schedules and retry predicates
//!
//! A file download that fails is put back on the queue after
//! [`calculate_delay`]; the self-update download sleeps for the same delay
//! inside [`RetryExecutor`](super::RetryExecutor).

use crate::types::{RetryPolicy, RetryStrategy};
use rand::Rng;
use std::time::Duration;

/// Delay to wait after the given failed attempt
///
/// `attempt` counts from 1. With `jitter`, up to a quarter of the delay is
/// added at random so workers retrying the same mirror spread out.
///
/// ```rust
/// use mirrorsync_core::retry::calculate_delay;
/// use mirrorsync_core::types::{RetryPolicy, RetryStrategy};
///
/// let download = RetryPolicy {
///     max_attempts: 3,
///     strategy: RetryStrategy::ExponentialBackoff,
///     backoff_multiplier: 2.0,
///     initial_delay_ms: 500,
///     max_delay_ms: 8000,
/// };
///
/// assert_eq!(calculate_delay(&download, 1, false).as_millis(), 500);
/// assert_eq!(calculate_delay(&download, 3, false).as_millis(), 2000);
/// ```
pub fn calculate_delay(policy: &RetryPolicy, attempt: u32, jitter: bool) -> Duration {
    let delay_ms = nominal_delay_ms(policy, attempt);

    if !jitter || delay_ms == 0 {
        return Duration::from_millis(delay_ms);
    }

    let spread = rand::rng().random_range(0..=delay_ms / 4);
    Duration::from_millis(delay_ms + spread)
}

/// Capped delay before jitter
fn nominal_delay_ms(policy: &RetryPolicy, attempt: u32) -> u64 {
    // Number of retries already waited out before this one
    let prior = attempt.max(1) - 1;

    let uncapped = match policy.strategy {
        RetryStrategy::None => return 0,
        RetryStrategy::FixedDelay => policy.initial_delay_ms,
        RetryStrategy::LinearBackoff => policy.initial_delay_ms.saturating_mul(u64::from(prior) + 1),
        RetryStrategy::ExponentialBackoff => {
            let factor = policy.backoff_multiplier.max(1.0).powi(prior as i32);
            (policy.initial_delay_ms as f64 * factor) as u64
        }
    };

    uncapped.min(policy.max_delay_ms)
}

/// Decides whether an error is worth another attempt
pub trait RetryPredicate<E: ?Sized>: Send + Sync {
    fn should_retry(&self, error: &E) -> bool;
}

/// Every error is retryable
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E: ?Sized> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E) -> bool {
        true
    }
}

/// Wraps a closure, e.g. "retry unless the mirror answered 4xx"
pub struct ClosurePredicate<F>(F);

impl<F> ClosurePredicate<F> {
    pub fn new(predicate: F) -> Self {
        Self(predicate)
    }
}

impl<E, F> RetryPredicate<E> for ClosurePredicate<F>
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &E) -> bool {
        (self.0)(error)
    }
}

//! Retry execution engine

use std::future::Future;
use std::time::Instant;

use crate::types::RetryPolicy;

use super::error::RetryError;
use super::observer::{NoOpObserver, RetryObserver};
use super::strategies::{calculate_delay, AlwaysRetry, RetryPredicate};

/// Execute an async operation with retry logic based on a policy
///
/// Every error is retried and nothing is observed. Use [`RetryExecutor`] for
/// a predicate or observer.
pub async fn retry_with_policy<F, Fut, T, E>(policy: &RetryPolicy, op: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
{
    RetryExecutor::new(policy.clone()).execute(op).await
}

/// A retry executor with configurable policy, predicate, and observer
///
/// ```rust
/// use mirrorsync_core::retry::{RetryExecutor, TracingObserver};
/// use mirrorsync_core::types::RetryPolicy;
///
/// let executor = RetryExecutor::new(RetryPolicy::default())
///     .with_observer(TracingObserver::new("self-update"))
///     .with_jitter(false);
/// ```
pub struct RetryExecutor<P = AlwaysRetry, O = NoOpObserver> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    jitter: bool,
}

impl RetryExecutor<AlwaysRetry, NoOpObserver> {
    /// Create an executor that retries every error, with jitter enabled
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            predicate: AlwaysRetry,
            observer: NoOpObserver,
            jitter: true,
        }
    }
}

impl<P, O> RetryExecutor<P, O> {
    /// Set the retry predicate
    pub fn with_predicate<P2>(self, predicate: P2) -> RetryExecutor<P2, O> {
        RetryExecutor {
            policy: self.policy,
            predicate,
            observer: self.observer,
            jitter: self.jitter,
        }
    }

    /// Set the observer
    pub fn with_observer<O2>(self, observer: O2) -> RetryExecutor<P, O2> {
        RetryExecutor {
            policy: self.policy,
            predicate: self.predicate,
            observer,
            jitter: self.jitter,
        }
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// The policy this executor runs with
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<P, O> RetryExecutor<P, O>
where
    O: RetryObserver,
{
    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T, E>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
        P: RetryPredicate<E>,
    {
        let start = Instant::now();
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            self.observer.on_attempt_start(attempt, max_attempts);

            let err = match op().await {
                Ok(result) => {
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(result);
                }
                Err(err) => err,
            };

            if !self.predicate.should_retry(&err) {
                self.observer.on_cancelled(attempt, Some(&err));
                return Err(RetryError::NonRetryable(err));
            }

            if attempt >= max_attempts {
                self.observer.on_exhausted(attempt, &err);
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: err,
                    total_duration: start.elapsed(),
                });
            }

            let delay = calculate_delay(&self.policy, attempt, self.jitter);
            self.observer.on_attempt_failed(attempt, &err, delay);

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        Err(RetryError::NoAttempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{ClosurePredicate, RetryObserver};
    use std::error::Error;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct Counts {
        started: AtomicU32,
        failed: AtomicU32,
        exhausted: AtomicU32,
    }

    impl RetryObserver for Counts {
        fn on_attempt_start(&self, _: u32, _: u32) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_attempt_failed(&self, _: u32, _: &dyn Error, _: Duration) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_exhausted(&self, _: u32, _: &dyn Error) {
            self.exhausted.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_with_policy(&RetryPolicy::immediate(3), || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(io::Error::other("flaky"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_after_max_attempts() {
        let counts = Arc::new(Counts::default());
        let executor = RetryExecutor::new(RetryPolicy::immediate(4)).with_observer(counts.clone());

        let err = executor
            .execute(|| async { Err::<(), _>(io::Error::other("down")) })
            .await
            .unwrap_err();

        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 4);
        assert_eq!(counts.started.load(Ordering::SeqCst), 4);
        assert_eq!(counts.failed.load(Ordering::SeqCst), 3);
        assert_eq!(counts.exhausted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_predicate_stops_retrying() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let executor = RetryExecutor::new(RetryPolicy::immediate(5)).with_predicate(
            ClosurePredicate::new(|e: &io::Error| e.kind() != io::ErrorKind::NotFound),
        );

        let err = executor
            .execute(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(io::Error::new(io::ErrorKind::NotFound, "gone"))
            })
            .await
            .unwrap_err();

        assert!(err.is_non_retryable());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_runs_nothing() {
        let err = retry_with_policy(&RetryPolicy::immediate(0), || async {
            Ok::<(), io::Error>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, RetryError::NoAttempts));
    }
}

//! Retry observation and logging

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Hooks fired by [`RetryExecutor`](super::RetryExecutor)
///
/// Every hook defaults to doing nothing, so an observer only implements the
/// events it cares about. Attempt numbers count from 1.
pub trait RetryObserver: Send + Sync {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        let _ = (attempt, max_attempts);
    }

    /// The attempt failed and another follows after `delay`
    fn on_attempt_failed(&self, attempt: u32, error: &dyn Error, delay: Duration) {
        let _ = (attempt, error, delay);
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        let _ = (attempt, total_duration);
    }

    /// The last allowed attempt failed
    fn on_exhausted(&self, attempts: u32, final_error: &dyn Error) {
        let _ = (attempts, final_error);
    }

    /// The predicate refused to retry
    fn on_cancelled(&self, attempt: u32, error: Option<&dyn Error>) {
        let _ = (attempt, error);
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for Arc<T> {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        T::on_attempt_start(self, attempt, max_attempts)
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Error, delay: Duration) {
        T::on_attempt_failed(self, attempt, error, delay)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        T::on_success(self, attempt, total_duration)
    }

    fn on_exhausted(&self, attempts: u32, final_error: &dyn Error) {
        T::on_exhausted(self, attempts, final_error)
    }

    fn on_cancelled(&self, attempt: u32, error: Option<&dyn Error>) {
        T::on_cancelled(self, attempt, error)
    }
}

/// Observes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {}

/// Logs retry events through `tracing`
///
/// Attempt starts go to DEBUG, failures and cancellations to WARN, exhaustion
/// to ERROR. A success after retries is logged at INFO.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: String,
}

impl TracingObserver {
    /// Create an observer tagging every event with `operation`
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        tracing::debug!(
            operation = %self.operation,
            attempt,
            max_attempts,
            "Starting attempt"
        );
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Error, delay: Duration) {
        tracing::warn!(
            operation = %self.operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Attempt failed, retrying"
        );
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation = %self.operation,
                attempt,
                duration_ms = total_duration.as_millis() as u64,
                "Succeeded after retry"
            );
        } else {
            tracing::debug!(operation = %self.operation, "Succeeded on first attempt");
        }
    }

    fn on_exhausted(&self, attempts: u32, final_error: &dyn Error) {
        tracing::error!(
            operation = %self.operation,
            attempts,
            error = %final_error,
            "All retry attempts exhausted"
        );
    }

    fn on_cancelled(&self, attempt: u32, error: Option<&dyn Error>) {
        match error {
            Some(e) => tracing::warn!(
                operation = %self.operation,
                attempt,
                error = %e,
                "Retry stopped, error is not retryable"
            ),
            None => tracing::warn!(operation = %self.operation, attempt, "Retry stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl RetryObserver for Recorder {
        fn on_exhausted(&self, attempts: u32, final_error: &dyn Error) {
            self.events
                .lock()
                .unwrap()
                .push(format!("exhausted {} {}", attempts, final_error));
        }
    }

    #[test]
    fn test_unimplemented_hooks_are_silent() {
        let recorder = Recorder::default();
        let err = io::Error::other("reset");
        recorder.on_attempt_start(1, 2);
        recorder.on_attempt_failed(1, &err, Duration::ZERO);
        recorder.on_success(2, Duration::from_millis(5));
        recorder.on_cancelled(2, None);
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_arc_forwards_to_inner() {
        let recorder = Arc::new(Recorder::default());
        let shared = recorder.clone();
        let err = io::Error::other("reset");

        shared.on_exhausted(3, &err);
        NoOpObserver.on_exhausted(1, &err);

        assert_eq!(*recorder.events.lock().unwrap(), vec!["exhausted 3 reset"]);
    }
}

//! Error type for the retry execution engine

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Why a retried operation gave up
///
/// `E` is the operation's own error; the last one seen is kept so callers
/// can match on it (e.g. a hash mismatch on the final download attempt).
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt the policy allowed failed
    Exhausted {
        attempts: u32,
        source: E,
        /// Wall time from the first attempt to the last failure
        total_duration: Duration,
    },

    /// The predicate refused to retry after this error
    NonRetryable(E),

    /// `max_attempts` was zero
    NoAttempts,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted {
                attempts,
                source,
                total_duration,
            } => write!(
                f,
                "gave up after {} attempts ({} ms): {}",
                attempts,
                total_duration.as_millis(),
                source
            ),
            RetryError::NonRetryable(source) => write!(f, "not retried: {}", source),
            RetryError::NoAttempts => f.write_str("policy allows no attempts"),
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.last_error().map(|e| e as &(dyn Error + 'static))
    }
}

impl<E> RetryError<E> {
    /// Attempts that actually ran
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::NonRetryable(_) => 1,
            RetryError::NoAttempts => 0,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    pub fn is_non_retryable(&self) -> bool {
        matches!(self, RetryError::NonRetryable(_))
    }

    /// Error from the final attempt, if any ran
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::NonRetryable(source) => Some(source),
            RetryError::NoAttempts => None,
        }
    }

    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::NonRetryable(source) => Some(source),
            RetryError::NoAttempts => None,
        }
    }
}

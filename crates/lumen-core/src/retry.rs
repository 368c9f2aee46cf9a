//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::error::DomainError;

/// How many times to try a transient operation and how long to wait between
/// attempts. The delay doubles after every failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never less than 1.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits, for tests.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` is 1-based.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Runs `operation` until it succeeds, fails with a non-transient error,
    /// or `max_attempts` is reached. The last error is returned on exhaustion.
    ///
    /// # Errors
    ///
    /// Returns the operation's error when it is not transient or when every
    /// attempt failed.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> Result<T, DomainError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match attempt_fn(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(operation, attempt, ?delay, error = %err, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        error!(operation, attempts = attempt, error = %err, "retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_doubles_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };

        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(4), Duration::from_millis(500));
        assert_eq!(policy.delay_after(40), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_run_retries_transient_errors_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = RetryPolicy::immediate(3)
            .run("flaky", move |_| async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(DomainError::PaymentGateway("timeout".into()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), DomainError> = RetryPolicy::immediate(4)
            .run("down", move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DomainError::Infrastructure("connection refused".into()))
            })
            .await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_run_does_not_retry_validation_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), DomainError> = RetryPolicy::immediate(5)
            .run("invalid", move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DomainError::Validation("bad".into()))
            })
            .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

//! Bounded retry with exponential backoff for transient failures.
//!
//! Used by the coordinator's compensating release: an un-released hold
//! causes user-visible unavailability, so the release is retried a few
//! times before the failure is escalated to an operational alert.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration for exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first try
    pub max_retries: usize,
    /// Initial delay before the first retry
    pub initial_delay: Duration,
    /// Cap on the backoff delay
    pub max_delay: Duration,
    /// Multiplier applied per attempt
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay = Duration::from_millis(
            (self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32)) as u64,
        );

        delay.min(self.max_delay)
    }
}

/// Runs `operation` until it succeeds or the policy's retries are spent,
/// returning the last error.
///
/// # Errors
///
/// Returns the final attempt's error once retries are exhausted.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "operation failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

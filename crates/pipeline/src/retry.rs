//! Bounded exponential backoff for remote calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Errors that know whether trying again can help.
pub trait Retryable {
    /// True for transient failures (HTTP 429 and 5xx).
    fn is_retryable(&self) -> bool;
}

/// True for the HTTP statuses worth retrying: 429 and 5xx.
#[must_use]
pub const fn is_retryable_status(status: u16) -> bool {
    status == 429 || (status >= 500 && status < 600)
}

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub retries: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base: Duration::from_millis(400),
        }
    }
}

impl RetryPolicy {
    /// Sleep after the failure of zero-based `attempt`: `base * 2^attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(Duration::MAX)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up.
///
/// Non-retryable errors are returned immediately. After the final attempt
/// the last error is returned without sleeping again.
///
/// # Errors
///
/// Returns the error of the last attempt.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let attempts = policy.retries.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Retryable failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

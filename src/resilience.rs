//! Retry with exponential backoff and first-success fallback.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::github::SourceError;

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(8000),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero based): `min(base * 2^attempt, max)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Runs `operation`, retrying transient failures according to `policy`.
///
/// Non-transient errors are returned immediately. When attempts run out the
/// last error is returned.
///
/// # Errors
///
/// Returns the error of the final attempt.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Transient GitHub failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Tries `first`, then each of `fallbacks` in order, and returns the first
/// success.
///
/// Candidates after a success are never attempted. There is always at least
/// one attempt, so a failure always names a real candidate.
///
/// # Errors
///
/// Returns the error of the last candidate tried.
pub async fn first_success<T, I, F, Fut>(first: String, fallbacks: I, mut operation: F) -> Result<T, SourceError>
where
    I: IntoIterator<Item = String>,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut last_error = match operation(first.clone()).await {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };
    debug!(candidate = %first, error = %last_error, "Candidate failed");

    for candidate in fallbacks {
        match operation(candidate.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                debug!(%candidate, error = %err, "Candidate failed");
                last_error = err;
            }
        }
    }
    Err(last_error)
}

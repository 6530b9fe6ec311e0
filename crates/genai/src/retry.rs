//! Retry-with-backoff for single generative API calls.
//!
//! Only rate-limit failures are retried. The wait before retry `n` is
//! `initial_delay * 2^(n-1)` plus a random jitter below `max_jitter`.
//! Every invocation of [`with_retry`] is independent: there is no shared
//! limiter and no memory of earlier failures.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::GenAiError;

/// Tunable parameters for the backoff strategy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Exclusive upper bound of the random jitter added to each delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Default::default()
        }
    }

    /// Delay after failed attempt `attempt` (1-based), before the next one.
    pub fn backoff_delay(&self, attempt: u32, jitter: Duration) -> Duration {
        let exp = attempt.saturating_sub(1).min(30);
        self.initial_delay.saturating_mul(1u32 << exp) + jitter
    }

    fn random_jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..max_ms))
    }
}

/// Invoke `call`, retrying rate-limited failures according to `policy`.
///
/// Non-rate-limit errors are returned after the first attempt. When the
/// last attempt is still rate limited, the error message is replaced with
/// [`QUOTA_EXCEEDED_MESSAGE`](crate::error::QUOTA_EXCEEDED_MESSAGE).
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut call: F) -> Result<T, GenAiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenAiError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_rate_limited() && attempt < max_attempts => {
                let delay = policy.backoff_delay(attempt, policy.random_jitter());
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Rate limited, retrying",
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) if e.is_rate_limited() => {
                tracing::error!(attempts = attempt, error = %e, "Rate limit retries exhausted");
                return Err(e.into_quota_exhausted());
            }
            Err(e) => return Err(e),
        }
    }
}

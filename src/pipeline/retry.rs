//! Bounded exponential backoff with full jitter.

use std::time::Duration;

use rand::Rng;

use crate::errors::RagError;

/// Retry policy applied to the stages marked retryable.
///
/// Delays double per attempt from `base_delay` and are drawn uniformly from
/// `0..=delay` (full jitter). A provider-supplied retry hint overrides the
/// computed delay for that attempt.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Upper bound of the backoff window for a zero-based attempt number.
    pub fn backoff_cap(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }

    fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        if let Some(hint) = hint {
            return hint;
        }
        let cap = self.backoff_cap(attempt).as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(0..=cap))
    }
}

/// Run `operation` until it succeeds, the error stops being retryable, or
/// attempts are exhausted.
///
/// `retryable` decides which error kinds are worth retrying at the calling
/// stage; everything else fails fast. Rate-limit errors carry an optional
/// provider hint which is honored over the computed backoff.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    retryable: impl Fn(&RagError) -> bool,
    mut operation: F,
) -> Result<T, RagError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, RagError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if retryable(&err) && attempt + 1 < policy.max_attempts => {
                let hint = match &err {
                    RagError::RateLimited { retry_after } => *retry_after,
                    _ => None,
                };
                let delay = policy.delay_for(attempt, hint);
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

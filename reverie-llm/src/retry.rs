//! Async retry combinator for generation calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::LlmError;

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts including the first; `0` is treated as `1`.
    pub max_attempts: u32,
    /// Wait before the second attempt.
    pub delay: Duration,
    /// Factor applied to the wait after every retry. `1.0` keeps it fixed.
    pub backoff_multiplier: f32,
    /// Upper bound for any single wait.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Fixed-delay policy.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            ..Self::default()
        }
    }

    /// Grow the delay by `multiplier` after each retry.
    #[must_use]
    pub fn with_backoff(mut self, multiplier: f32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = f64::from(self.backoff_multiplier.max(0.0)).powi(exponent);
        let secs = self.delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are spent. `op` receives the 1-based attempt number.
///
/// # Errors
/// Returns the first non-retryable error unchanged, or
/// [`LlmError::RetriesExhausted`] carrying the last failure.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, LlmError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let attempts = policy.attempts();
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                last_error = e.to_string();
                if attempt < attempts {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(LlmError::RetriesExhausted {
        attempts,
        last_error,
    })
}

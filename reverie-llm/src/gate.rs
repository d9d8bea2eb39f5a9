//! Generation gate: bounded concurrency, per-attempt timeout and retry
//! around a [`TextGenerator`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::LlmError;
use crate::generator::TextGenerator;
use crate::retry::{RetryPolicy, with_retry};

/// Every generation call in the engine goes through one shared gate.
///
/// A permit is held only while an attempt is in flight, never during a
/// retry delay, so waiting retries do not starve other callers.
#[derive(Clone)]
pub struct GenerationGate {
    generator: Arc<dyn TextGenerator>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for GenerationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationGate")
            .field("model", &self.generator.model_name())
            .field("max_concurrent", &self.max_concurrent)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl GenerationGate {
    /// Wrap `generator`. `max_concurrent` of `0` is treated as `1`.
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        max_concurrent: usize,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            generator,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            timeout,
            retry,
        }
    }

    /// Permits not currently held.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Concurrency limit.
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Complete `prompt` under the gate's limits.
    ///
    /// # Errors
    /// Non-retryable generator errors are returned as-is; otherwise
    /// [`LlmError::RetriesExhausted`] once the retry budget is spent.
    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        with_retry(&self.retry, "generate", |attempt| async move {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| LlmError::Unavailable("generation gate closed".into()))?;
            debug!(attempt, model = self.generator.model_name(), "Generation attempt");
            match tokio::time::timeout(self.timeout, self.generator.complete(prompt)).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(timeout_ms)),
            }
        })
        .await
    }
}

//! The text-generation seam.

use async_trait::async_trait;

use crate::error::LlmError;

/// Anything that turns a prompt into completion text.
///
/// One call is one attempt: retries, timeouts and concurrency limits are
/// applied around it by [`GenerationGate`](crate::GenerationGate).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str {
        "unknown"
    }
}

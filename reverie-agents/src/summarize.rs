//! Optional LLM condensation of memories before they are stored.

use tracing::{debug, warn};

use reverie_llm::prompt::summarize_prompt;

use crate::engine::Engine;

/// Condenses memory text through the engine's generation gate.
#[derive(Debug, Clone, Copy)]
pub struct MemorySummarizer<'a> {
    engine: &'a Engine,
}

impl<'a> MemorySummarizer<'a> {
    /// Summarizer sharing `engine`'s gate and metrics.
    #[must_use]
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// A condensed form of `content` given `context`. Falls back to
    /// `content` unchanged if generation fails or returns nothing.
    pub async fn summarize(&self, content: &str, context: &str) -> String {
        match self.engine.generate(&summarize_prompt(content, context)).await {
            Ok(text) if !text.trim().is_empty() => {
                debug!(from = content.len(), to = text.trim().len(), "Memory summarized");
                text.trim().to_string()
            }
            Ok(_) => {
                warn!("Summarizer returned empty text, storing original");
                content.to_string()
            }
            Err(e) => {
                warn!(error = %e, "Summarizer failed, storing original");
                content.to_string()
            }
        }
    }
}

impl Engine {
    /// Summarizer bound to this engine.
    #[must_use]
    pub fn summarizer(&self) -> MemorySummarizer<'_> {
        MemorySummarizer::new(self)
    }
}

//! LLM reflections over an agent's memories.

use std::sync::atomic::Ordering;

use tracing::{debug, warn};

use reverie_core::{AgentId, MemoryRecord, ReflectionKind};
use reverie_llm::LlmError;
use reverie_llm::prompt::reflection_prompt;

use crate::engine::Engine;
use crate::error::Result;

impl Engine {
    /// Generate and store one reflection of `kind` for `agent`.
    ///
    /// Reads the newest short-term memories and the top long-term memories
    /// (the latter counts as an access), asks the model for a reflection and
    /// stores the trimmed text as a long-term record of importance 10.
    ///
    /// Never fails: any error is logged and yields `None`.
    pub async fn reflect(&self, agent: &AgentId, kind: ReflectionKind) -> Option<MemoryRecord> {
        match self.try_reflect(agent, kind).await {
            Ok(record) => Some(record),
            Err(e) => {
                self.counters.reflections_failed.fetch_add(1, Ordering::Relaxed);
                warn!(agent = %agent, kind = %kind, error = %e, "Reflection failed");
                None
            }
        }
    }

    async fn try_reflect(&self, agent: &AgentId, kind: ReflectionKind) -> Result<MemoryRecord> {
        let limits = &self.config.memory;
        let short_term = self.memory.recent(agent, limits.recent_limit)?;
        let long_term = self.memory.top(agent, limits.top_limit)?;

        let prompt = reflection_prompt(agent.as_str(), &short_term, &long_term, kind.as_str());
        let text = self.generate(&prompt).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(LlmError::SchemaValidation("empty reflection".into()).into());
        }

        debug!(agent = %agent, kind = %kind, chars = text.len(), "Reflection generated");
        Ok(self.memory.store_reflection(agent, kind, text)?)
    }
}

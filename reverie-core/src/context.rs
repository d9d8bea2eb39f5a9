//! Context assembly.
//!
//! A context is a point-in-time snapshot of what an agent has on its mind:
//! its newest short-term memories, its most important long-term facts and
//! the recent dialogue it took part in. The same rendering feeds importance
//! scoring (as the relevance reference) and prompt composition, so its
//! layout is fixed:
//!
//! ```text
//! === Short-Term Memories ===
//! <newest first, or "(none available)">
//!
//! === Long-Term Memories ===
//! <highest importance first, or "(none available)">
//!
//! === Conversation History ===
//! <speaker: message, oldest first, or "(none available)">
//! ```

use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::MemoryConfig;
use crate::error::Result;
use crate::memory::MemoryStore;
use crate::persistence::SqliteStore;
use crate::types::{AgentId, ConversationTurn};

/// Placeholder rendered for an empty section.
pub const EMPTY_SECTION: &str = "(none available)";

/// How much of each section to include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimits {
    /// Short-term memories.
    pub max_short_term: usize,
    /// Long-term memories.
    pub max_long_term: usize,
    /// Conversation turns.
    pub history: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_short_term: 5,
            max_long_term: 5,
            history: 10,
        }
    }
}

impl From<&MemoryConfig> for ContextLimits {
    fn from(config: &MemoryConfig) -> Self {
        Self {
            max_short_term: config.recent_limit,
            max_long_term: config.top_limit,
            history: config.history_limit,
        }
    }
}

/// Structured context for one agent; flattened only by [`render`](Self::render).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSnapshot {
    /// Newest short-term contents, newest first.
    pub short_term: Vec<String>,
    /// Non-reflection long-term contents in rank order.
    pub long_term: Vec<String>,
    /// Turns the agent took part in, oldest first.
    pub history: Vec<ConversationTurn>,
}

impl ContextSnapshot {
    /// Render the fixed three-section text layout.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        section(&mut out, "Short-Term Memories", self.short_term.iter().map(String::as_str));
        out.push('\n');
        section(&mut out, "Long-Term Memories", self.long_term.iter().map(String::as_str));
        out.push('\n');

        out.push_str("=== Conversation History ===\n");
        if self.history.is_empty() {
            out.push_str(EMPTY_SECTION);
            out.push('\n');
        }
        for turn in &self.history {
            // Writing into a String cannot fail.
            let _ = writeln!(out, "{}: {}", turn.speaker, turn.message);
        }
        out
    }
}

fn section<'a>(out: &mut String, title: &str, lines: impl Iterator<Item = &'a str>) {
    out.push_str("=== ");
    out.push_str(title);
    out.push_str(" ===\n");
    let mut any = false;
    for line in lines {
        out.push_str(line);
        out.push('\n');
        any = true;
    }
    if !any {
        out.push_str(EMPTY_SECTION);
        out.push('\n');
    }
}

/// Builds [`ContextSnapshot`]s from the memory store and conversation log.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    memory: Arc<MemoryStore>,
    store: Arc<SqliteStore>,
}

impl ContextAssembler {
    /// Create an assembler reading from `memory` and the log in `store`.
    #[must_use]
    pub fn new(memory: Arc<MemoryStore>, store: Arc<SqliteStore>) -> Self {
        Self { memory, store }
    }

    /// Gather the structured context for `agent`. Read-only.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn snapshot(&self, agent: &AgentId, limits: ContextLimits) -> Result<ContextSnapshot> {
        Ok(ContextSnapshot {
            short_term: self.memory.recent(agent, limits.max_short_term)?,
            long_term: self.memory.top_facts(agent, limits.max_long_term)?,
            history: self.store.turns_involving(agent, limits.history)?,
        })
    }

    /// Gather and render the context for `agent`.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn assemble(&self, agent: &AgentId, limits: ContextLimits) -> Result<String> {
        Ok(self.snapshot(agent, limits)?.render())
    }
}

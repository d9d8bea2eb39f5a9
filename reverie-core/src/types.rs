//! Core type definitions shared by every Reverie component.
//!
//! All records are plain data with named fields; text is only produced
//! when a prompt or context block is rendered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ReverieError;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Name of a simulated agent. Each agent owns its own memory and emotion
/// partitions, keyed by this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    /// Create an agent id from any string-like value.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the underlying name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Row identifier of a memory record. Unique within its [`Tier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemoryId(pub i64);

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one dialogue session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    /// Create a new random conversation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

/// A dense vector produced by an [`EmbeddingProvider`](crate::embedding::EmbeddingProvider).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

// ---------------------------------------------------------------------------
// Memory records
// ---------------------------------------------------------------------------

/// Which partition a memory record currently lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Bounded, recency-ordered working memory.
    ShortTerm,
    /// Unbounded, importance-ordered durable memory.
    LongTerm,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortTerm => f.write_str("short_term"),
            Self::LongTerm => f.write_str("long_term"),
        }
    }
}

/// The flavour of an LLM-synthesized reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflectionKind {
    /// Concise overview of recent events.
    Summary,
    /// Forward-looking plan of action.
    Strategy,
    /// Key takeaway from past interactions.
    Lesson,
    /// Likely outcome of the current situation.
    Prediction,
    /// Free-form reflection used outside the periodic cycle.
    General,
}

impl ReflectionKind {
    /// Kinds generated by every maintenance cycle, in generation order.
    pub const PERIODIC: [Self; 4] = [Self::Summary, Self::Strategy, Self::Lesson, Self::Prediction];

    /// Stable lowercase name used in storage and prompts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Strategy => "strategy",
            Self::Lesson => "lesson",
            Self::Prediction => "prediction",
            Self::General => "general",
        }
    }

    /// Text shown in a [`ReflectionSet`](crate::memory::ReflectionSet) when no
    /// reflection of this kind exists yet.
    #[must_use]
    pub const fn placeholder(self) -> &'static str {
        match self {
            Self::Summary => "No summary available.",
            Self::Strategy => "No strategy available.",
            Self::Lesson => "No lesson available.",
            Self::Prediction => "No prediction available.",
            Self::General => "No reflection available.",
        }
    }
}

impl fmt::Display for ReflectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReflectionKind {
    type Err = ReverieError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summary" => Ok(Self::Summary),
            "strategy" => Ok(Self::Strategy),
            "lesson" => Ok(Self::Lesson),
            "prediction" => Ok(Self::Prediction),
            "general" => Ok(Self::General),
            other => Err(ReverieError::Serialization(format!(
                "unknown reflection kind '{other}'"
            ))),
        }
    }
}

/// A single remembered item owned by one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Row id within the record's tier.
    pub id: MemoryId,
    /// Agent that owns this memory.
    pub owner: AgentId,
    /// Remembered text.
    pub content: String,
    /// Importance in `[0, 10]`.
    pub importance: f32,
    /// When the memory was first written.
    pub created_at: DateTime<Utc>,
    /// How many times a long-term retrieval returned this record.
    pub access_count: u32,
    /// Current partition.
    pub tier: Tier,
    /// Last retrieval time. Only set for long-term records.
    pub last_accessed: Option<DateTime<Utc>>,
    /// Set when this record is an LLM reflection.
    pub reflection_kind: Option<ReflectionKind>,
}

impl MemoryRecord {
    /// Whether this record was produced by the reflection generator.
    #[must_use]
    pub fn is_reflection(&self) -> bool {
        self.reflection_kind.is_some()
    }
}

// ---------------------------------------------------------------------------
// Dialogue log
// ---------------------------------------------------------------------------

/// Speaker name used for transcript rows that record a failed turn.
pub const ERROR_SPEAKER: &str = "Error";

/// One row of the append-only conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Session this turn belongs to.
    pub conversation: ConversationId,
    /// Monotonic number within the session.
    pub turn_number: u64,
    /// Who spoke. [`ERROR_SPEAKER`] for failure rows.
    pub speaker: String,
    /// Who the message was directed to, if anyone.
    pub addressee: Option<AgentId>,
    /// What was said.
    pub message: String,
    /// Wall-clock time of the utterance.
    pub occurred_at: DateTime<Utc>,
}

/// An agent's private reasoning for one reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtRecord {
    /// Agent whose thought this is.
    pub agent: AgentId,
    /// Session the reply belonged to.
    pub conversation: ConversationId,
    /// Turn number of the reply.
    pub turn_number: u64,
    /// Extracted thought-process text.
    pub thought: String,
    /// When the thought was recorded.
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflection_kind_parses_case_insensitively() {
        let kind: ReflectionKind = " Lesson ".parse().expect("parse lesson");
        assert_eq!(kind, ReflectionKind::Lesson);
        assert!("musing".parse::<ReflectionKind>().is_err());
    }

    #[test]
    fn periodic_kinds_exclude_general() {
        assert!(!ReflectionKind::PERIODIC.contains(&ReflectionKind::General));
        assert_eq!(ReflectionKind::PERIODIC.len(), 4);
    }

    #[test]
    fn agent_id_displays_its_name() {
        assert_eq!(AgentId::from("Ada").to_string(), "Ada");
    }
}

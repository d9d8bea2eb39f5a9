//! # Reverie Core Library
//!
//! Memory, emotion and context state for simulated conversational agents.
//!
//! Every agent owns:
//!
//! - a **short-term** memory partition: bounded, recency-ordered, where
//!   every utterance lands first with a computed importance;
//! - a **long-term** partition: unbounded and importance-ordered, fed by
//!   promotion (importance ≥ 7) and by LLM reflections;
//! - an **emotion** series: an append-only log of 8-dimensional Plutchik
//!   vectors whose recent average is the agent's current mood.
//!
//! Importance blends contextual relevance (embedding cosine similarity),
//! recency, repetition and sentiment; see [`scoring`]. All state lives in
//! SQLite through [`persistence::SqliteStore`]. The LLM-facing parts
//! (reflection, dialogue) live in `reverie-agents`.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod context;
pub mod embedding;
pub mod emotion;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod persistence;
pub mod scoring;
pub mod sentiment;
pub mod types;

pub use config::ReverieConfig;
pub use context::{ContextAssembler, ContextLimits, ContextSnapshot};
pub use emotion::{EmotionTracker, EmotionVector};
pub use error::ReverieError;
pub use memory::{MemoryStore, ReflectionSet};
pub use persistence::SqliteStore;
pub use types::*;

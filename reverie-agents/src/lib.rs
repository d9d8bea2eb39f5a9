//! # reverie-agents: agents that remember, reflect and feel
//!
//! Ties [`reverie_core`] state to [`reverie_llm`] generation:
//!
//! - [`Engine`]: shared handle over the store, memory tiers, emotion
//!   tracker and generation gate;
//! - [`Conversation`]: a dialogue session that owns its turn counter and
//!   runs the assemble → prompt → generate → parse → react → persist turn;
//! - reflection and the periodic maintenance cycle
//!   ([`Engine::run_maintenance`], [`spawn_maintenance_loop`]);
//! - the emotion questionnaire ([`Engine::measure_emotion`]) and the
//!   memory summarizer.

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod conversation;
pub mod engine;
pub mod error;
pub mod maintenance;
pub mod probe;
pub mod reflection;
pub mod summarize;
pub mod telemetry;

pub use conversation::{Agent, Conversation, TurnOutcome};
pub use engine::{Collaborators, Engine, EngineMetrics};
pub use error::{AgentError, Result};
pub use maintenance::{MaintenanceReport, spawn_maintenance_loop};
pub use summarize::MemorySummarizer;

//! Agent-layer errors.

use reverie_core::ReverieError;
use reverie_llm::LlmError;
use thiserror::Error;

/// Errors surfaced by turns, maintenance and engine setup.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Store, scoring or configuration failure in the core.
    #[error(transparent)]
    Core(#[from] ReverieError),

    /// Generation failed after the gate's retry budget.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Invalid engine setup.
    #[error("Agent configuration error: {0}")]
    Config(String),
}

/// Result alias for the agent layer.
pub type Result<T> = std::result::Result<T, AgentError>;

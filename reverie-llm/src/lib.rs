//! # reverie-llm: text generation for Reverie agents
//!
//! Everything that talks to, or about, a language model:
//!   - [`TextGenerator`]: the async seam every backend implements
//!   - [`LlmClient`]: OpenAI-compatible and Ollama HTTP backends
//!   - [`GenerationGate`]: bounded concurrency, per-attempt timeout and retry
//!   - [`prompt`]: conversation, reflection, summary and questionnaire templates
//!   - [`response`]: tolerant parsing of `Thought process:` / `Speech:` replies
//!
//! # Call path
//!
//! ```text
//! prompt::* ──► GenerationGate::generate ──► with_retry ──► Semaphore permit
//!                                                           └► timeout(TextGenerator::complete)
//! ```

pub mod client;
pub mod error;
pub mod gate;
pub mod generator;
pub mod prompt;
pub mod response;
pub mod retry;

pub use client::{LlmClient, LlmProvider};
pub use error::LlmError;
pub use gate::GenerationGate;
pub use generator::TextGenerator;
pub use response::{LabeledReply, parse_labeled_reply};
pub use retry::{RetryPolicy, with_retry};

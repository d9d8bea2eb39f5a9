//! Configuration for the Reverie engine.
//!
//! Maps directly to `reverie.toml`. Every field has a default, so an empty
//! document is a valid configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level engine configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReverieConfig {
    /// Logging settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Memory tier limits and promotion policy.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Importance weights and embedding size.
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Emotion averaging and damping.
    #[serde(default)]
    pub emotion: EmotionConfig,
    /// Text-generation backend and call budget.
    #[serde(default)]
    pub llm: LlmConfig,
    /// SQLite store settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Background maintenance cadence.
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

impl ReverieConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ReverieError::Config` if the TOML is invalid or a value is
    /// out of range.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| crate::ReverieError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject values the engine cannot operate with.
    ///
    /// # Errors
    /// Returns `ReverieError::Config` naming the offending key.
    pub fn validate(&self) -> crate::error::Result<()> {
        let fail = |msg: &str| Err(crate::ReverieError::Config(msg.to_string()));
        if self.memory.short_term_capacity == 0 {
            return fail("memory.short_term_capacity must be at least 1");
        }
        if !(0.0..=10.0).contains(&self.memory.promotion_threshold) {
            return fail("memory.promotion_threshold must lie in [0, 10]");
        }
        if self.emotion.window == 0 {
            return fail("emotion.window must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.emotion.damping_alpha) {
            return fail("emotion.damping_alpha must lie in [0, 1]");
        }
        if self.llm.max_concurrent == 0 {
            return fail("llm.max_concurrent must be at least 1");
        }
        if self.llm.max_attempts == 0 {
            return fail("llm.max_attempts must be at least 1");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format: `text` or `json`.
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Per-agent memory capacity and retrieval sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum short-term records per agent before the oldest is evicted.
    #[serde(default = "default_10_usize")]
    pub short_term_capacity: usize,
    /// Short-term records at or above this importance are promoted.
    #[serde(default = "default_7_0")]
    pub promotion_threshold: f32,
    /// Short-term memories included in contexts and reflection prompts.
    #[serde(default = "default_5_usize")]
    pub recent_limit: usize,
    /// Long-term memories included in contexts and reflection prompts.
    #[serde(default = "default_5_usize")]
    pub top_limit: usize,
    /// Conversation turns included in an assembled context.
    #[serde(default = "default_10_usize")]
    pub history_limit: usize,
    /// Ask the LLM to condense a reply before storing it.
    #[serde(default)]
    pub summarize_before_store: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_capacity: 10,
            promotion_threshold: 7.0,
            recent_limit: 5,
            top_limit: 5,
            history_limit: 10,
            summarize_before_store: false,
        }
    }
}

/// Weights of the importance formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Weight of context relevance.
    #[serde(default = "default_0_4")]
    pub relevance_weight: f32,
    /// Weight of recency.
    #[serde(default = "default_0_3")]
    pub recency_weight: f32,
    /// Weight of repetition frequency.
    #[serde(default = "default_0_2")]
    pub frequency_weight: f32,
    /// Weight of sentiment.
    #[serde(default = "default_0_1")]
    pub sentiment_weight: f32,
    /// Dimensionality of the built-in hashing embedder.
    #[serde(default = "default_256")]
    pub embedding_dimensions: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            relevance_weight: 0.4,
            recency_weight: 0.3,
            frequency_weight: 0.2,
            sentiment_weight: 0.1,
            embedding_dimensions: 256,
        }
    }
}

/// Emotion averaging window and damping parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionConfig {
    /// Number of most recent states averaged into the current emotion.
    #[serde(default = "default_10_usize")]
    pub window: usize,
    /// Dimensions above this value are pulled back toward the target.
    #[serde(default = "default_0_7")]
    pub damping_threshold: f32,
    /// Fraction of the distance to the target removed per adjustment.
    #[serde(default = "default_0_2")]
    pub damping_alpha: f32,
    /// Resting value damped dimensions move toward.
    #[serde(default = "default_0_5")]
    pub damping_target: f32,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            window: 10,
            damping_threshold: 0.7,
            damping_alpha: 0.2,
            damping_target: 0.5,
        }
    }
}

/// Text-generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend: `openai` (any OpenAI-compatible server), `ollama`, or `none`.
    #[serde(default = "default_openai")]
    pub provider: String,
    /// Server base URL.
    #[serde(default = "default_llm_url")]
    pub base_url: String,
    /// Model name sent with each request.
    #[serde(default = "default_model")]
    pub model: String,
    /// Bearer token for OpenAI-compatible servers.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_0_7")]
    pub temperature: f32,
    /// Maximum tokens per completion.
    #[serde(default = "default_512")]
    pub max_tokens: u32,
    /// Maximum generation calls in flight at once.
    #[serde(default = "default_5_usize")]
    pub max_concurrent: usize,
    /// Per-attempt timeout.
    #[serde(default = "default_10000")]
    pub request_timeout_ms: u64,
    /// Attempts per call, including the first.
    #[serde(default = "default_3")]
    pub max_attempts: u32,
    /// Delay before the second attempt.
    #[serde(default = "default_2000")]
    pub retry_delay_ms: u64,
    /// Growth factor applied to the delay after each retry. `1.0` keeps it fixed.
    #[serde(default = "default_1_0")]
    pub backoff_multiplier: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_openai(),
            base_url: default_llm_url(),
            model: default_model(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 512,
            max_concurrent: 5,
            request_timeout_ms: 10_000,
            max_attempts: 3,
            retry_delay_ms: 2000,
            backoff_multiplier: 1.0,
        }
    }
}

/// SQLite store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database file. `:memory:` opens a private in-memory database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// How long a statement waits on a locked database.
    #[serde(default = "default_5000")]
    pub busy_timeout_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            wal_mode: true,
            busy_timeout_ms: 5000,
        }
    }
}

/// Background maintenance cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Whether callers should spawn the periodic loop.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between cycles for one agent.
    #[serde(default = "default_60")]
    pub interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
fn default_openai() -> String { "openai".to_string() }
fn default_llm_url() -> String { "http://127.0.0.1:1234".to_string() }
fn default_model() -> String { "local-model".to_string() }
fn default_db_path() -> PathBuf { PathBuf::from("reverie.db") }
fn default_0_1() -> f32 { 0.1 }
fn default_0_2() -> f32 { 0.2 }
fn default_0_3() -> f32 { 0.3 }
fn default_0_4() -> f32 { 0.4 }
fn default_0_5() -> f32 { 0.5 }
fn default_0_7() -> f32 { 0.7 }
fn default_1_0() -> f32 { 1.0 }
fn default_7_0() -> f32 { 7.0 }
fn default_3() -> u32 { 3 }
fn default_512() -> u32 { 512 }
fn default_5_usize() -> usize { 5 }
fn default_10_usize() -> usize { 10 }
fn default_256() -> usize { 256 }
fn default_60() -> u64 { 60 }
fn default_2000() -> u64 { 2000 }
fn default_5000() -> u64 { 5000 }
fn default_10000() -> u64 { 10_000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ReverieConfig::from_toml("").expect("empty toml");
        assert_eq!(config.memory.short_term_capacity, 10);
        assert!((config.memory.promotion_threshold - 7.0).abs() < f32::EPSILON);
        assert_eq!(config.llm.max_concurrent, 5);
        assert_eq!(config.llm.request_timeout_ms, 10_000);
        assert_eq!(config.maintenance.interval_secs, 60);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ReverieConfig::from_toml(
            "[memory]\nshort_term_capacity = 4\n\n[llm]\nprovider = \"ollama\"\nbase_url = \"http://localhost:11434\"\n",
        )
        .expect("partial toml");
        assert_eq!(config.memory.short_term_capacity, 4);
        assert_eq!(config.memory.recent_limit, 5);
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.max_attempts, 3);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(ReverieConfig::from_toml("[memory]\nshort_term_capacity = 0\n").is_err());
        assert!(ReverieConfig::from_toml("[emotion]\ndamping_alpha = 1.5\n").is_err());
        assert!(ReverieConfig::from_toml("[llm]\nmax_attempts = 0\n").is_err());
        assert!(ReverieConfig::from_toml("not = [valid").is_err());
    }
}

//! The shared engine handle.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{info, warn};

use reverie_core::embedding::{EmbeddingProvider, HashingEmbeddingProvider};
use reverie_core::emotion::EmotionTracker;
use reverie_core::metrics::{CounterSnapshot, EngineCounters, LatencyPercentiles, LatencyWindow};
use reverie_core::scoring::ImportanceScorer;
use reverie_core::sentiment::{LexiconSentiment, SentimentAnalyzer};
use reverie_core::{
    AgentId, ContextAssembler, ContextLimits, EmotionVector, MemoryRecord, MemoryStore,
    ReverieConfig, SqliteStore, Tier,
};
use reverie_llm::prompt::AGENT_SYSTEM;
use reverie_llm::{GenerationGate, LlmClient, LlmError, LlmProvider, RetryPolicy, TextGenerator};

use crate::error::Result;

const LATENCY_SAMPLES: usize = 1024;

/// External models the engine depends on.
#[derive(Clone)]
pub struct Collaborators {
    /// Text generation backend.
    pub generator: Arc<dyn TextGenerator>,
    /// Embedding model used for relevance.
    pub embedder: Arc<dyn EmbeddingProvider>,
    /// Sentiment model used for importance and emotion.
    pub sentiment: Arc<dyn SentimentAnalyzer>,
}

impl Collaborators {
    /// The built-in set: HTTP client from `[llm]`, hashing embedder sized by
    /// `[scoring]`, word-list sentiment.
    ///
    /// # Errors
    /// Returns an error for an unknown provider or zero embedding dimensions.
    pub fn from_config(config: &ReverieConfig) -> Result<Self> {
        let llm = &config.llm;
        let provider =
            LlmProvider::from_parts(&llm.provider, llm.base_url.clone(), llm.api_key.clone())?;
        let client = LlmClient::new(provider, llm.model.clone())
            .with_sampling(llm.temperature, llm.max_tokens)
            .with_system_prompt(AGENT_SYSTEM);
        Ok(Self {
            generator: Arc::new(client),
            embedder: Arc::new(HashingEmbeddingProvider::new(config.scoring.embedding_dimensions)?),
            sentiment: Arc::new(LexiconSentiment::new()),
        })
    }
}

/// Counters plus generation latency percentiles.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineMetrics {
    /// Event counters.
    pub counters: CounterSnapshot,
    /// Latency of successful generation calls, retries included.
    pub generation_latency: LatencyPercentiles,
}

/// Shared state for every agent: store, memory tiers, emotion tracker and
/// the generation gate. Cheap to share behind an `Arc`.
pub struct Engine {
    pub(crate) config: ReverieConfig,
    pub(crate) store: Arc<SqliteStore>,
    pub(crate) memory: Arc<MemoryStore>,
    pub(crate) emotion: EmotionTracker,
    pub(crate) context: ContextAssembler,
    pub(crate) gate: GenerationGate,
    pub(crate) counters: Arc<EngineCounters>,
    latency: LatencyWindow,
    pub(crate) maintenance_locks: DashMap<AgentId, Arc<tokio::sync::Mutex<()>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("store", &self.store)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build an engine over an already opened store.
    ///
    /// # Errors
    /// Returns [`AgentError::Core`](crate::AgentError::Core) if the configuration is invalid.
    pub fn new(
        config: ReverieConfig,
        store: SqliteStore,
        collaborators: Collaborators,
    ) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(store);
        let counters = Arc::new(EngineCounters::new());

        let memory = Arc::new(MemoryStore::new(
            Arc::clone(&store),
            ImportanceScorer::new(collaborators.embedder, config.scoring.clone()),
            Arc::clone(&collaborators.sentiment),
            config.memory.clone(),
            Arc::clone(&counters),
        ));
        let emotion = EmotionTracker::new(
            Arc::clone(&store),
            collaborators.sentiment,
            config.emotion.clone(),
            Arc::clone(&counters),
        );
        let context = ContextAssembler::new(Arc::clone(&memory), Arc::clone(&store));

        let llm = &config.llm;
        let retry = RetryPolicy::new(llm.max_attempts, Duration::from_millis(llm.retry_delay_ms))
            .with_backoff(llm.backoff_multiplier);
        let gate = GenerationGate::new(
            collaborators.generator,
            llm.max_concurrent,
            Duration::from_millis(llm.request_timeout_ms),
            retry,
        );

        info!(
            db = %store.path().display(),
            max_concurrent = gate.max_concurrent(),
            "Engine ready"
        );

        Ok(Self {
            config,
            store,
            memory,
            emotion,
            context,
            gate,
            counters,
            latency: LatencyWindow::new(LATENCY_SAMPLES),
            maintenance_locks: DashMap::new(),
        })
    }

    /// Open the store named in `[persistence]` and build an engine.
    ///
    /// # Errors
    /// Returns an error if the store cannot be opened or the configuration
    /// is invalid.
    pub fn open(config: ReverieConfig, collaborators: Collaborators) -> Result<Self> {
        let store = SqliteStore::from_config(&config.persistence)?;
        Self::new(config, store, collaborators)
    }

    /// Open the configured store with the built-in collaborators.
    ///
    /// # Errors
    /// See [`Collaborators::from_config`] and [`Engine::open`].
    pub fn from_config(config: ReverieConfig) -> Result<Self> {
        let collaborators = Collaborators::from_config(&config)?;
        Self::open(config, collaborators)
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &ReverieConfig {
        &self.config
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    /// Memory tiers.
    #[must_use]
    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    /// Emotion tracker.
    #[must_use]
    pub fn emotion(&self) -> &EmotionTracker {
        &self.emotion
    }

    /// Rendered context for `agent` with the configured limits.
    ///
    /// # Errors
    /// Returns [`AgentError::Core`](crate::AgentError::Core) on store failures.
    pub fn context(&self, agent: &AgentId) -> Result<String> {
        Ok(self.context.assemble(agent, ContextLimits::from(&self.config.memory))?)
    }

    /// Average of the agent's recent emotion states.
    ///
    /// # Errors
    /// Returns [`AgentError::Core`](crate::AgentError::Core) on store failures.
    pub fn current_emotion(&self, agent: &AgentId) -> Result<EmotionVector> {
        Ok(self.emotion.current(agent)?)
    }

    /// Append an explicit emotion state, e.g. to seed a scenario.
    ///
    /// # Errors
    /// Returns [`AgentError::Core`](crate::AgentError::Core) on store failures.
    pub fn seed_emotion(&self, agent: &AgentId, vector: EmotionVector) -> Result<()> {
        Ok(self.emotion.record(agent, vector)?)
    }

    /// Every memory of `agent` in one tier: short-term newest first,
    /// long-term in importance order. Does not count as an access.
    ///
    /// # Errors
    /// Returns [`AgentError::Core`](crate::AgentError::Core) on store failures.
    pub fn recent_memories(&self, agent: &AgentId, tier: Tier) -> Result<Vec<MemoryRecord>> {
        let records = match tier {
            Tier::ShortTerm => self.memory.short_term_records(agent)?,
            Tier::LongTerm => self.memory.long_term_records(agent)?,
        };
        Ok(records)
    }

    /// Counter snapshot and generation latency.
    #[must_use]
    pub fn metrics(&self) -> EngineMetrics {
        EngineMetrics {
            counters: self.counters.snapshot(),
            generation_latency: self.latency.percentiles(),
        }
    }

    /// Complete `prompt` through the gate, recording call metrics.
    pub(crate) async fn generate(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        self.counters.llm_calls.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        let result = self.gate.generate(prompt).await;
        match &result {
            Ok(_) => self.latency.record(start.elapsed()),
            Err(e) => {
                self.counters.llm_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, elapsed_ms = start.elapsed().as_millis(), "Generation failed");
            }
        }
        result
    }
}

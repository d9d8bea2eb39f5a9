//! Per-agent memory tiers.
//!
//! | Tier       | Bound                      | Order                                  |
//! |------------|----------------------------|----------------------------------------|
//! | short-term | `short_term_capacity` (10) | newest first; oldest evicted           |
//! | long-term  | unbounded                  | importance desc, then last access desc |
//!
//! Every mutation of one agent's partitions (insert, promote, rescan) runs
//! under that agent's lock, so a record cannot be promoted twice or evicted
//! mid-promotion. Different agents never contend.

mod long_term;
mod promotion;
mod rescan;
mod short_term;

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::config::MemoryConfig;
use crate::metrics::EngineCounters;
use crate::persistence::SqliteStore;
use crate::scoring::ImportanceScorer;
use crate::sentiment::SentimentAnalyzer;
use crate::types::{AgentId, ReflectionKind};

pub use long_term::REFLECTION_IMPORTANCE;
pub use rescan::RescanReport;

// ---------------------------------------------------------------------------
// Reflection set
// ---------------------------------------------------------------------------

/// The newest reflection text of each periodic kind, with a placeholder
/// sentence for kinds that have not been generated yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionSet {
    /// Latest summary.
    pub summary: String,
    /// Latest strategy.
    pub strategy: String,
    /// Latest lesson.
    pub lesson: String,
    /// Latest prediction.
    pub prediction: String,
}

impl ReflectionSet {
    /// A set where every kind shows its placeholder.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            summary: ReflectionKind::Summary.placeholder().to_string(),
            strategy: ReflectionKind::Strategy.placeholder().to_string(),
            lesson: ReflectionKind::Lesson.placeholder().to_string(),
            prediction: ReflectionKind::Prediction.placeholder().to_string(),
        }
    }

    /// Text for `kind`. `General` has no slot and always yields its placeholder.
    #[must_use]
    pub fn get(&self, kind: ReflectionKind) -> &str {
        match kind {
            ReflectionKind::Summary => &self.summary,
            ReflectionKind::Strategy => &self.strategy,
            ReflectionKind::Lesson => &self.lesson,
            ReflectionKind::Prediction => &self.prediction,
            ReflectionKind::General => ReflectionKind::General.placeholder(),
        }
    }

    fn slot_mut(&mut self, kind: ReflectionKind) -> Option<&mut String> {
        match kind {
            ReflectionKind::Summary => Some(&mut self.summary),
            ReflectionKind::Strategy => Some(&mut self.strategy),
            ReflectionKind::Lesson => Some(&mut self.lesson),
            ReflectionKind::Prediction => Some(&mut self.prediction),
            ReflectionKind::General => None,
        }
    }
}

impl Default for ReflectionSet {
    fn default() -> Self {
        Self::empty()
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Short-term and long-term memory for every agent, backed by SQLite.
pub struct MemoryStore {
    store: Arc<SqliteStore>,
    scorer: ImportanceScorer,
    sentiment: Arc<dyn SentimentAnalyzer>,
    config: MemoryConfig,
    counters: Arc<EngineCounters>,
    locks: DashMap<AgentId, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("store", &self.store)
            .field("scorer", &self.scorer)
            .field("config", &self.config)
            .field("agents", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Create a memory store over `store`.
    #[must_use]
    pub fn new(
        store: Arc<SqliteStore>,
        scorer: ImportanceScorer,
        sentiment: Arc<dyn SentimentAnalyzer>,
        config: MemoryConfig,
        counters: Arc<EngineCounters>,
    ) -> Self {
        Self {
            store,
            scorer,
            sentiment,
            config,
            counters,
            locks: DashMap::new(),
        }
    }

    /// The memory limits in effect.
    #[must_use]
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// The scorer used for inserts and rescans.
    #[must_use]
    pub fn scorer(&self) -> &ImportanceScorer {
        &self.scorer
    }

    /// The single-writer lock for `agent`'s partitions.
    fn agent_lock(&self, agent: &AgentId) -> Arc<Mutex<()>> {
        self.locks
            .entry(agent.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

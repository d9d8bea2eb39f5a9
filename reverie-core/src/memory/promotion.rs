use std::sync::atomic::Ordering;

use chrono::Utc;
use tracing::{debug, info};

use super::MemoryStore;
use crate::error::Result;
use crate::types::{AgentId, MemoryRecord};

impl MemoryStore {
    /// Move every short-term record at or above the promotion threshold into
    /// long-term memory. Returns the newly created long-term records.
    ///
    /// Each move is a single transaction and the agent lock is held for the
    /// whole pass, so no record is promoted twice or left in both tiers.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures. Records moved before the failure stay moved.
    pub fn promote(&self, agent: &AgentId) -> Result<Vec<MemoryRecord>> {
        let lock = self.agent_lock(agent);
        let _guard = lock.lock();

        let candidates = self
            .store
            .short_term_at_or_above(agent, self.config.promotion_threshold)?;
        let now = Utc::now();

        let mut promoted = Vec::with_capacity(candidates.len());
        for id in candidates {
            if let Some(record) = self.store.promote_short_term(id, now)? {
                debug!(
                    agent = %agent,
                    from = %id,
                    to = %record.id,
                    importance = record.importance,
                    "Promoted memory"
                );
                promoted.push(record);
            }
        }

        if !promoted.is_empty() {
            self.counters
                .memories_promoted
                .fetch_add(promoted.len() as u64, Ordering::Relaxed);
            info!(agent = %agent, count = promoted.len(), "Promoted short-term memories");
        }
        Ok(promoted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{MemoryConfig, ScoringConfig};
    use crate::embedding::StubEmbeddingProvider;
    use crate::metrics::EngineCounters;
    use crate::persistence::SqliteStore;
    use crate::scoring::ImportanceScorer;
    use crate::sentiment::LexiconSentiment;

    #[test]
    fn only_records_at_threshold_move() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("open"));
        let m = MemoryStore::new(
            Arc::clone(&store),
            ImportanceScorer::new(
                Arc::new(StubEmbeddingProvider::default()),
                ScoringConfig::default(),
            ),
            Arc::new(LexiconSentiment::new()),
            MemoryConfig::default(),
            Arc::new(EngineCounters::new()),
        );
        let ada = AgentId::new("Ada");
        let now = Utc::now();
        store.insert_short_term(&ada, "exactly seven", 7.0, now).expect("insert");
        store.insert_short_term(&ada, "just below", 6.0, now).expect("insert");
        store.insert_short_term(&ada, "high", 9.0, now).expect("insert");

        let promoted = m.promote(&ada).expect("promote");
        let mut moved: Vec<_> = promoted.iter().map(|r| r.content.as_str()).collect();
        moved.sort_unstable();
        assert_eq!(moved, vec!["exactly seven", "high"]);

        assert_eq!(m.recent(&ada, 10).expect("stm"), vec!["just below"]);
        assert!(m.promote(&ada).expect("second pass").is_empty());
    }
}

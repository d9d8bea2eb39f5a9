use std::sync::atomic::Ordering;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::MemoryStore;
use crate::error::Result;
use crate::scoring::ScoreInputs;
use crate::sentiment::polarity_or_neutral;
use crate::types::{AgentId, MemoryRecord, Tier};

impl MemoryStore {
    /// Score and store a new short-term memory, evicting the oldest entry
    /// if the partition grows past capacity. Returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn insert(&self, agent: &AgentId, content: &str, context: &str) -> Result<MemoryRecord> {
        self.insert_at(agent, content, context, Utc::now())
    }

    /// Like [`insert`](Self::insert) with an explicit creation time.
    /// Back-dated entries start with a lower recency score.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn insert_at(
        &self,
        agent: &AgentId,
        content: &str,
        context: &str,
        created_at: DateTime<Utc>,
    ) -> Result<MemoryRecord> {
        let start = Instant::now();
        let lock = self.agent_lock(agent);
        let _guard = lock.lock();

        let frequency = self.store.count_matching(Tier::ShortTerm, agent, content)?;
        let importance = self.scorer.score(&ScoreInputs {
            content,
            context,
            recency_minutes: minutes_since(created_at),
            frequency,
            sentiment: polarity_or_neutral(self.sentiment.as_ref(), content),
        });

        let record = self.store.insert_short_term(agent, content, importance, created_at)?;
        self.counters.memories_stored.fetch_add(1, Ordering::Relaxed);

        let mut size = self.store.count_short_term(agent)?;
        while size > self.config.short_term_capacity {
            let Some(evicted) = self.store.evict_oldest_short_term(agent)? else {
                break;
            };
            self.counters.memories_evicted.fetch_add(1, Ordering::Relaxed);
            debug!(agent = %agent, memory = %evicted, "Evicted oldest short-term memory");
            size -= 1;
        }

        debug!(
            agent = %agent,
            memory = %record.id,
            importance,
            frequency,
            elapsed_us = start.elapsed().as_micros(),
            "Stored short-term memory"
        );
        Ok(record)
    }

    /// The `k` most recent short-term contents, newest first. Read-only.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn recent(&self, agent: &AgentId, k: usize) -> Result<Vec<String>> {
        Ok(self
            .store
            .recent_short_term(agent, Some(k))?
            .into_iter()
            .map(|r| r.content)
            .collect())
    }

    /// Every short-term record of `agent`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn short_term_records(&self, agent: &AgentId) -> Result<Vec<MemoryRecord>> {
        self.store.recent_short_term(agent, None)
    }
}

/// Whole minutes elapsed since `then`; future timestamps count as zero.
pub(super) fn minutes_since(then: DateTime<Utc>) -> u64 {
    u64::try_from((Utc::now() - then).num_minutes()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::config::{MemoryConfig, ScoringConfig};
    use crate::embedding::HashingEmbeddingProvider;
    use crate::metrics::EngineCounters;
    use crate::persistence::SqliteStore;
    use crate::scoring::ImportanceScorer;
    use crate::sentiment::LexiconSentiment;

    fn memory() -> MemoryStore {
        MemoryStore::new(
            Arc::new(SqliteStore::open_in_memory().expect("open")),
            ImportanceScorer::new(
                Arc::new(HashingEmbeddingProvider::default()),
                ScoringConfig::default(),
            ),
            Arc::new(LexiconSentiment::new()),
            MemoryConfig::default(),
            Arc::new(EngineCounters::new()),
        )
    }

    #[test]
    fn insert_scores_and_recent_returns_content() {
        let m = memory();
        let ada = AgentId::new("Ada");
        let rec = m.insert(&ada, "The ferry leaves at noon", "").expect("insert");
        assert!((rec.importance - 3.0).abs() < f32::EPSILON);
        assert_eq!(m.recent(&ada, 5).expect("recent"), vec!["The ferry leaves at noon"]);
    }

    #[test]
    fn repeated_content_raises_frequency() {
        let m = memory();
        let ada = AgentId::new("Ada");
        let first = m.insert(&ada, "bell rings", "").expect("first");
        let third = {
            m.insert(&ada, "bell rings", "").expect("second");
            m.insert(&ada, "bell rings", "").expect("third")
        };
        // Two prior copies add 0.2 * 4.
        assert!(third.importance > first.importance);
    }

    #[test]
    fn capacity_evicts_the_earliest_created() {
        let m = memory();
        let x = AgentId::new("X");
        let now = Utc::now();
        for i in 0..10 {
            m.insert_at(&x, &format!("entry {i}"), "", now - Duration::minutes(i64::from(20 - i)))
                .expect("fill");
        }
        m.insert(&x, "overflow", "").expect("overflow");

        let contents: Vec<_> = m
            .short_term_records(&x)
            .expect("records")
            .into_iter()
            .map(|r| r.content)
            .collect();
        assert_eq!(contents.len(), 10);
        assert!(!contents.contains(&"entry 0".to_string()));
        assert!(contents.contains(&"overflow".to_string()));
    }

    #[test]
    fn back_dated_entries_lose_recency() {
        let m = memory();
        let ada = AgentId::new("Ada");
        let old = m
            .insert_at(&ada, "stale news", "", Utc::now() - Duration::hours(3))
            .expect("insert");
        // Recency 0 leaves only the neutral sentiment term: 0.1 * 5 -> 0.
        assert!(old.importance.abs() < f32::EPSILON);
    }
}

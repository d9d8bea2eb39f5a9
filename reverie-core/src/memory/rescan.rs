use std::sync::atomic::Ordering;
use std::time::Instant;

use tracing::{debug, info};

use super::MemoryStore;
use super::short_term::minutes_since;
use crate::error::Result;
use crate::scoring::ScoreInputs;
use crate::sentiment::polarity_or_neutral;
use crate::types::{AgentId, MemoryRecord, Tier};

/// Outcome of one importance rescan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RescanReport {
    /// Short-term records scored.
    pub short_term: usize,
    /// Long-term records scored, reflections included.
    pub long_term: usize,
    /// Records whose stored importance changed.
    pub changed: usize,
}

impl MemoryStore {
    /// Recompute the importance of every memory of `agent` against a fresh
    /// `context`, using current recency, frequency and sentiment.
    ///
    /// Short-term recency counts from creation, long-term recency from the
    /// last access. Frequency counts the *other* records in the same tier
    /// with identical content. Reflections are rescored like any other
    /// long-term record.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn rescan_importance(&self, agent: &AgentId, context: &str) -> Result<RescanReport> {
        let start = Instant::now();
        let lock = self.agent_lock(agent);
        let _guard = lock.lock();

        let mut report = RescanReport::default();

        for record in self.store.recent_short_term(agent, None)? {
            report.short_term += 1;
            if self.rescore(&record, context)? {
                report.changed += 1;
            }
        }

        for record in self.store.ranked_long_term(agent, None, true)? {
            report.long_term += 1;
            if self.rescore(&record, context)? {
                report.changed += 1;
            }
        }

        self.counters
            .importance_rescored
            .fetch_add((report.short_term + report.long_term) as u64, Ordering::Relaxed);
        info!(
            agent = %agent,
            short_term = report.short_term,
            long_term = report.long_term,
            changed = report.changed,
            elapsed_us = start.elapsed().as_micros(),
            "Importance rescan complete"
        );
        Ok(report)
    }

    /// Score one record and write it back if the value moved.
    fn rescore(&self, record: &MemoryRecord, context: &str) -> Result<bool> {
        let since = match record.tier {
            Tier::ShortTerm => record.created_at,
            Tier::LongTerm => record.last_accessed.unwrap_or(record.created_at),
        };
        let matches = self
            .store
            .count_matching(record.tier, &record.owner, &record.content)?;

        let importance = self.scorer.score(&ScoreInputs {
            content: &record.content,
            context,
            recency_minutes: minutes_since(since),
            frequency: matches.saturating_sub(1),
            sentiment: polarity_or_neutral(self.sentiment.as_ref(), &record.content),
        });

        if (importance - record.importance).abs() < f32::EPSILON {
            return Ok(false);
        }
        self.store.update_importance(record.tier, record.id, importance)?;
        debug!(
            memory = %record.id,
            tier = %record.tier,
            old = record.importance,
            new = importance,
            "Importance changed"
        );
        Ok(true)
    }
}

use std::sync::atomic::Ordering;

use chrono::Utc;
use tracing::{debug, info};

use super::{MemoryStore, ReflectionSet};
use crate::error::Result;
use crate::types::{AgentId, MemoryRecord, ReflectionKind};

/// Importance assigned to every stored reflection.
pub const REFLECTION_IMPORTANCE: f32 = 10.0;

impl MemoryStore {
    /// The `k` highest-ranked long-term contents (importance, then last
    /// access). Each returned record has its access count bumped and its
    /// last-access time refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn top(&self, agent: &AgentId, k: usize) -> Result<Vec<String>> {
        let records = self.store.ranked_long_term(agent, Some(k), true)?;
        let ids: Vec<_> = records.iter().map(|r| r.id).collect();
        self.store.touch_long_term(&ids, Utc::now())?;
        debug!(agent = %agent, returned = ids.len(), "Long-term retrieval");
        Ok(records.into_iter().map(|r| r.content).collect())
    }

    /// The `k` highest-ranked non-reflection long-term contents, without
    /// touching access statistics.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn top_facts(&self, agent: &AgentId, k: usize) -> Result<Vec<String>> {
        Ok(self
            .store
            .ranked_long_term(agent, Some(k), false)?
            .into_iter()
            .map(|r| r.content)
            .collect())
    }

    /// Every long-term record of `agent` in rank order, reflections included.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn long_term_records(&self, agent: &AgentId) -> Result<Vec<MemoryRecord>> {
        self.store.ranked_long_term(agent, None, true)
    }

    /// Store a reflection as a long-term record of fixed importance.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn store_reflection(
        &self,
        agent: &AgentId,
        kind: ReflectionKind,
        text: &str,
    ) -> Result<MemoryRecord> {
        let record =
            self.store
                .insert_long_term(agent, text, REFLECTION_IMPORTANCE, Some(kind), Utc::now())?;
        self.counters.reflections_stored.fetch_add(1, Ordering::Relaxed);
        info!(agent = %agent, kind = %kind, memory = %record.id, "Stored reflection");
        Ok(record)
    }

    /// The newest reflection of each periodic kind.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn reflections(&self, agent: &AgentId) -> Result<ReflectionSet> {
        let mut set = ReflectionSet::empty();
        for kind in ReflectionKind::PERIODIC {
            if let Some(record) = self.store.latest_reflection(agent, kind)? {
                if let Some(slot) = set.slot_mut(kind) {
                    *slot = record.content;
                }
            }
        }
        Ok(set)
    }
}

//! SQLite persistence layer for agent memories, emotions and dialogue.
//!
//! Five append-or-delete tables, each keyed by the owning agent:
//!
//! ```sql
//! short_term_memory (id, agent, content, importance, created_at, access_count)
//! long_term_memory  (id, agent, content, importance, created_at, last_accessed,
//!                    access_count, reflection_kind)
//! conversation_log  (id, conversation, turn_number, speaker, addressee, message, occurred_at)
//! thought_log       (id, agent, conversation, turn_number, thought, recorded_at)
//! emotion_states    (id, agent, recorded_at, joy, trust, fear, surprise,
//!                    sadness, disgust, anger, anticipation)
//! ```
//!
//! Timestamps are stored as Unix microseconds so range scans order
//! numerically; the row id breaks ties between rows written within the same
//! microsecond. The connection sits behind a mutex, so every statement is
//! atomic; only promotion needs a multi-statement transaction.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use tracing::{debug, info};

use crate::config::PersistenceConfig;
use crate::emotion::{EmotionState, EmotionVector};
use crate::error::{Result, ReverieError};
use crate::types::{
    AgentId, ConversationId, ConversationTurn, MemoryId, MemoryRecord, ReflectionKind,
    ThoughtRecord, Tier,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS short_term_memory (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    agent        TEXT    NOT NULL,
    content      TEXT    NOT NULL,
    importance   REAL    NOT NULL,
    created_at   INTEGER NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_stm_agent_created ON short_term_memory (agent, created_at);

CREATE TABLE IF NOT EXISTS long_term_memory (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    agent           TEXT    NOT NULL,
    content         TEXT    NOT NULL,
    importance      REAL    NOT NULL,
    created_at      INTEGER NOT NULL,
    last_accessed   INTEGER NOT NULL,
    access_count    INTEGER NOT NULL DEFAULT 0,
    reflection_kind TEXT
);
CREATE INDEX IF NOT EXISTS idx_ltm_agent_rank
    ON long_term_memory (agent, importance, last_accessed);

CREATE TABLE IF NOT EXISTS conversation_log (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation TEXT    NOT NULL,
    turn_number  INTEGER NOT NULL,
    speaker      TEXT    NOT NULL,
    addressee    TEXT,
    message      TEXT    NOT NULL,
    occurred_at  INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_log_turn ON conversation_log (conversation, turn_number);

CREATE TABLE IF NOT EXISTS thought_log (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    agent        TEXT    NOT NULL,
    conversation TEXT    NOT NULL,
    turn_number  INTEGER NOT NULL,
    thought      TEXT    NOT NULL,
    recorded_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS emotion_states (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    agent        TEXT    NOT NULL,
    recorded_at  INTEGER NOT NULL,
    joy          REAL    NOT NULL,
    trust        REAL    NOT NULL,
    fear         REAL    NOT NULL,
    surprise     REAL    NOT NULL,
    sadness      REAL    NOT NULL,
    disgust      REAL    NOT NULL,
    anger        REAL    NOT NULL,
    anticipation REAL    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_emotion_agent_time ON emotion_states (agent, recorded_at);
";

const STM_COLUMNS: &str = "id, agent, content, importance, created_at, access_count";
const LTM_COLUMNS: &str =
    "id, agent, content, importance, created_at, access_count, last_accessed, reflection_kind";
const TURN_COLUMNS: &str = "conversation, turn_number, speaker, addressee, message, occurred_at";
const EMOTION_COLUMNS: &str =
    "agent, recorded_at, joy, trust, fear, surprise, sadness, disgust, anger, anticipation";

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// Handle to the SQLite database backing every agent's state.
///
/// # Usage
///
/// ```no_run
/// # use reverie_core::persistence::SqliteStore;
/// # use reverie_core::config::PersistenceConfig;
/// # use reverie_core::types::AgentId;
/// let store = SqliteStore::open("agents.db", &PersistenceConfig::default())?;
/// let ada = AgentId::new("Ada");
/// store.insert_short_term(&ada, "The well is dry", 4.0, chrono::Utc::now())?;
/// let recent = store.recent_short_term(&ada, Some(5))?;
/// # Ok::<(), reverie_core::error::ReverieError>(())
/// ```
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) an SQLite database at `path`.
    ///
    /// The schema is created if it does not exist. WAL mode is enabled when
    /// `config.wal_mode` is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            // journal_mode returns the resulting mode as a row.
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "Reverie store opened"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Open a private in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Open whatever `config.db_path` names; `:memory:` gives an in-memory
    /// database.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn from_config(config: &PersistenceConfig) -> Result<Self> {
        if config.db_path.as_os_str() == ":memory:" {
            Self::open_in_memory()
        } else {
            Self::open(&config.db_path, config)
        }
    }

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    // ------------------------------------------------------------------
    // Short-term memory
    // ------------------------------------------------------------------

    /// Append a short-term record and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn insert_short_term(
        &self,
        agent: &AgentId,
        content: &str,
        importance: f32,
        created_at: DateTime<Utc>,
    ) -> Result<MemoryRecord> {
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO short_term_memory (agent, content, importance, created_at, access_count)
             VALUES (?1, ?2, ?3, ?4, 0)",
        )?
        .execute(params![
            agent.as_str(),
            content,
            f64::from(importance),
            micros(created_at)
        ])?;
        let id = MemoryId(conn.last_insert_rowid());

        Ok(MemoryRecord {
            id,
            owner: agent.clone(),
            content: content.to_string(),
            importance,
            created_at: from_micros(micros(created_at)),
            access_count: 0,
            tier: Tier::ShortTerm,
            last_accessed: None,
            reflection_kind: None,
        })
    }

    /// Number of short-term records owned by `agent`.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn count_short_term(&self, agent: &AgentId) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .prepare_cached("SELECT COUNT(*) FROM short_term_memory WHERE agent = ?1")?
            .query_row(params![agent.as_str()], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Number of records in `tier` owned by `agent` whose content equals
    /// `content` exactly.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn count_matching(&self, tier: Tier, agent: &AgentId, content: &str) -> Result<u32> {
        let sql = match tier {
            Tier::ShortTerm => {
                "SELECT COUNT(*) FROM short_term_memory WHERE agent = ?1 AND content = ?2"
            }
            Tier::LongTerm => {
                "SELECT COUNT(*) FROM long_term_memory WHERE agent = ?1 AND content = ?2"
            }
        };
        let conn = self.conn.lock();
        let count: i64 = conn
            .prepare_cached(sql)?
            .query_row(params![agent.as_str(), content], |row| row.get(0))?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Delete the single oldest short-term record of `agent`.
    ///
    /// Returns the evicted id, or `None` if the partition was empty.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn evict_oldest_short_term(&self, agent: &AgentId) -> Result<Option<MemoryId>> {
        let conn = self.conn.lock();
        let oldest: Option<i64> = conn
            .prepare_cached(
                "SELECT id FROM short_term_memory WHERE agent = ?1
                 ORDER BY created_at ASC, id ASC LIMIT 1",
            )?
            .query_row(params![agent.as_str()], |row| row.get(0))
            .optional()?;

        let Some(id) = oldest else {
            return Ok(None);
        };
        conn.prepare_cached("DELETE FROM short_term_memory WHERE id = ?1")?
            .execute(params![id])?;
        Ok(Some(MemoryId(id)))
    }

    /// Short-term records of `agent`, newest first. `None` returns all.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn recent_short_term(
        &self,
        agent: &AgentId,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {STM_COLUMNS} FROM short_term_memory WHERE agent = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![agent.as_str(), sql_limit(limit)], short_term_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Ids of `agent`'s short-term records with importance `>= threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn short_term_at_or_above(&self, agent: &AgentId, threshold: f32) -> Result<Vec<MemoryId>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id FROM short_term_memory WHERE agent = ?1 AND importance >= ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![agent.as_str(), f64::from(threshold)], |row| {
            row.get::<_, i64>(0).map(MemoryId)
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Move one short-term record into long-term memory.
    ///
    /// The insert and the delete run in one transaction so the record is
    /// never visible in both tiers. Returns the new long-term record, or
    /// `None` if the short-term row no longer exists.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn promote_short_term(
        &self,
        id: MemoryId,
        now: DateTime<Utc>,
    ) -> Result<Option<MemoryRecord>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let source = tx
            .prepare_cached(&format!("SELECT {STM_COLUMNS} FROM short_term_memory WHERE id = ?1"))?
            .query_row(params![id.0], short_term_row)
            .optional()?;
        let Some(source) = source else {
            return Ok(None);
        };

        tx.prepare_cached(
            "INSERT INTO long_term_memory
                 (agent, content, importance, created_at, last_accessed, access_count, reflection_kind)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
        )?
        .execute(params![
            source.owner.as_str(),
            source.content,
            f64::from(source.importance),
            micros(source.created_at),
            micros(now),
            source.access_count,
        ])?;
        let new_id = MemoryId(tx.last_insert_rowid());
        tx.prepare_cached("DELETE FROM short_term_memory WHERE id = ?1")?
            .execute(params![id.0])?;
        tx.commit()?;

        Ok(Some(MemoryRecord {
            id: new_id,
            tier: Tier::LongTerm,
            last_accessed: Some(from_micros(micros(now))),
            ..source
        }))
    }

    /// Overwrite the importance of one record.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn update_importance(&self, tier: Tier, id: MemoryId, importance: f32) -> Result<()> {
        let sql = match tier {
            Tier::ShortTerm => "UPDATE short_term_memory SET importance = ?2 WHERE id = ?1",
            Tier::LongTerm => "UPDATE long_term_memory SET importance = ?2 WHERE id = ?1",
        };
        let conn = self.conn.lock();
        conn.prepare_cached(sql)?
            .execute(params![id.0, f64::from(importance)])?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Long-term memory
    // ------------------------------------------------------------------

    /// Append a long-term record (a reflection when `kind` is set).
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn insert_long_term(
        &self,
        agent: &AgentId,
        content: &str,
        importance: f32,
        kind: Option<ReflectionKind>,
        now: DateTime<Utc>,
    ) -> Result<MemoryRecord> {
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO long_term_memory
                 (agent, content, importance, created_at, last_accessed, access_count, reflection_kind)
             VALUES (?1, ?2, ?3, ?4, ?4, 0, ?5)",
        )?
        .execute(params![
            agent.as_str(),
            content,
            f64::from(importance),
            micros(now),
            kind.map(ReflectionKind::as_str),
        ])?;
        let id = MemoryId(conn.last_insert_rowid());
        let stamp = from_micros(micros(now));

        Ok(MemoryRecord {
            id,
            owner: agent.clone(),
            content: content.to_string(),
            importance,
            created_at: stamp,
            access_count: 0,
            tier: Tier::LongTerm,
            last_accessed: Some(stamp),
            reflection_kind: kind,
        })
    }

    /// Long-term records of `agent` ordered by importance, then last access,
    /// descending. Does not touch access statistics.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures, or
    /// [`ReverieError::CorruptRecord`] for an unknown reflection kind.
    pub fn ranked_long_term(
        &self,
        agent: &AgentId,
        limit: Option<usize>,
        include_reflections: bool,
    ) -> Result<Vec<MemoryRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {LTM_COLUMNS} FROM long_term_memory
             WHERE agent = ?1 AND (?2 OR reflection_kind IS NULL)
             ORDER BY importance DESC, last_accessed DESC, id DESC LIMIT ?3"
        ))?;
        let rows = stmt.query_map(
            params![agent.as_str(), include_reflections, sql_limit(limit)],
            long_term_row,
        )?;
        collect_long_term(rows)
    }

    /// Record a retrieval of each listed long-term record: bump
    /// `access_count` and set `last_accessed = now`.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn touch_long_term(&self, ids: &[MemoryId], now: DateTime<Utc>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "UPDATE long_term_memory
                 SET access_count = access_count + 1, last_accessed = ?2
                 WHERE id = ?1",
            )?;
            for id in ids {
                stmt.execute(params![id.0, micros(now)])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Most recent reflection of `kind` for `agent`.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn latest_reflection(
        &self,
        agent: &AgentId,
        kind: ReflectionKind,
    ) -> Result<Option<MemoryRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .prepare_cached(&format!(
                "SELECT {LTM_COLUMNS} FROM long_term_memory
                 WHERE agent = ?1 AND reflection_kind = ?2
                 ORDER BY created_at DESC, id DESC LIMIT 1"
            ))?
            .query_row(params![agent.as_str(), kind.as_str()], long_term_row)
            .optional()?;
        row.map(RawLongTerm::into_record).transpose()
    }

    // ------------------------------------------------------------------
    // Conversation & thought logs
    // ------------------------------------------------------------------

    /// Append one row to the conversation log. Turn numbers are unique
    /// within a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures, including a
    /// turn number already taken.
    pub fn append_turn(&self, turn: &ConversationTurn) -> Result<()> {
        let conn = self.conn.lock();
        insert_turn(&conn, turn)
    }

    /// Append a message, its reply and the replier's thought in one
    /// transaction: either all three rows are written or none.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures, including a
    /// turn number already taken.
    pub fn append_exchange(
        &self,
        message: &ConversationTurn,
        reply: &ConversationTurn,
        thought: &ThoughtRecord,
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        insert_turn(&tx, message)?;
        insert_turn(&tx, reply)?;
        insert_thought(&tx, thought)?;
        tx.commit()?;
        Ok(())
    }

    /// The last `limit` turns `agent` spoke or was addressed in, across all
    /// conversations, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn turns_involving(&self, agent: &AgentId, limit: usize) -> Result<Vec<ConversationTurn>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {TURN_COLUMNS} FROM conversation_log
             WHERE speaker = ?1 OR addressee = ?1
             ORDER BY occurred_at DESC, id DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![agent.as_str(), sql_limit(Some(limit))], turn_row)?;
        let mut turns = collect_turns(rows)?;
        turns.reverse();
        Ok(turns)
    }

    /// Every logged turn of one conversation in turn order.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn turns_in(&self, conversation: ConversationId) -> Result<Vec<ConversationTurn>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {TURN_COLUMNS} FROM conversation_log
             WHERE conversation = ?1 ORDER BY turn_number ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![conversation.to_string()], turn_row)?;
        collect_turns(rows)
    }

    /// Highest turn number logged for `conversation`.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn last_turn_number(&self, conversation: ConversationId) -> Result<Option<u64>> {
        let conn = self.conn.lock();
        let max: Option<i64> = conn
            .prepare_cached(
                "SELECT MAX(turn_number) FROM conversation_log WHERE conversation = ?1",
            )?
            .query_row(params![conversation.to_string()], |row| row.get(0))?;
        Ok(max.map(from_sql_int))
    }

    /// Append one thought-process record.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn append_thought(&self, thought: &ThoughtRecord) -> Result<()> {
        let conn = self.conn.lock();
        insert_thought(&conn, thought)
    }

    /// The last `limit` thoughts of `agent`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn thoughts_for(&self, agent: &AgentId, limit: usize) -> Result<Vec<ThoughtRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT agent, conversation, turn_number, thought, recorded_at FROM thought_log
             WHERE agent = ?1 ORDER BY recorded_at DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![agent.as_str(), sql_limit(Some(limit))], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut thoughts = Vec::new();
        for row in rows {
            let (agent, conversation, turn, thought, at) = row?;
            thoughts.push(ThoughtRecord {
                agent: AgentId(agent),
                conversation: parse_conversation(&conversation, "thought_log")?,
                turn_number: from_sql_int(turn),
                thought,
                recorded_at: from_micros(at),
            });
        }
        Ok(thoughts)
    }

    // ------------------------------------------------------------------
    // Emotion states
    // ------------------------------------------------------------------

    /// Append one emotion snapshot for `agent`.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn append_emotion(
        &self,
        agent: &AgentId,
        vector: &EmotionVector,
        recorded_at: DateTime<Utc>,
    ) -> Result<()> {
        let v = vector.to_array().map(f64::from);
        let conn = self.conn.lock();
        conn.prepare_cached(&format!(
            "INSERT INTO emotion_states ({EMOTION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ))?
        .execute(params![
            agent.as_str(),
            micros(recorded_at),
            v[0],
            v[1],
            v[2],
            v[3],
            v[4],
            v[5],
            v[6],
            v[7],
        ])?;
        Ok(())
    }

    /// The last `limit` emotion snapshots of `agent`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn recent_emotions(&self, agent: &AgentId, limit: usize) -> Result<Vec<EmotionState>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {EMOTION_COLUMNS} FROM emotion_states WHERE agent = ?1
             ORDER BY recorded_at DESC, id DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![agent.as_str(), sql_limit(Some(limit))], emotion_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Every emotion snapshot of `agent` recorded at or after `since`,
    /// newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn emotions_since(
        &self,
        agent: &AgentId,
        since: DateTime<Utc>,
    ) -> Result<Vec<EmotionState>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {EMOTION_COLUMNS} FROM emotion_states
             WHERE agent = ?1 AND recorded_at >= ?2
             ORDER BY recorded_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![agent.as_str(), micros(since)], emotion_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    // ------------------------------------------------------------------
    // Backup
    // ------------------------------------------------------------------

    /// Copy the database to `dest_path` using SQLite's online-backup API.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let conn = self.conn.lock();
        let backup = rusqlite::backup::Backup::new(&conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;

        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Database backup completed"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping helpers
// ---------------------------------------------------------------------------

fn micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn from_micros(value: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(value).unwrap_or_default()
}

fn sql_limit(limit: Option<usize>) -> i64 {
    // SQLite treats a negative LIMIT as unbounded.
    limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX))
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

// Importance is written from an f32 and always lies in [0, 10].
#[allow(clippy::cast_possible_truncation)]
fn importance_from_sql(value: f64) -> f32 {
    value as f32
}

fn short_term_row(row: &Row<'_>) -> rusqlite::Result<MemoryRecord> {
    Ok(MemoryRecord {
        id: MemoryId(row.get(0)?),
        owner: AgentId(row.get(1)?),
        content: row.get(2)?,
        importance: importance_from_sql(row.get(3)?),
        created_at: from_micros(row.get(4)?),
        access_count: row.get(5)?,
        tier: Tier::ShortTerm,
        last_accessed: None,
        reflection_kind: None,
    })
}

/// A long-term row before its reflection kind has been validated.
struct RawLongTerm {
    record: MemoryRecord,
    kind: Option<String>,
}

impl RawLongTerm {
    fn into_record(self) -> Result<MemoryRecord> {
        let reflection_kind = match self.kind {
            None => None,
            Some(raw) => Some(raw.parse::<ReflectionKind>().map_err(|e| {
                ReverieError::CorruptRecord {
                    table: "long_term_memory",
                    reason: e.to_string(),
                }
            })?),
        };
        Ok(MemoryRecord {
            reflection_kind,
            ..self.record
        })
    }
}

fn long_term_row(row: &Row<'_>) -> rusqlite::Result<RawLongTerm> {
    Ok(RawLongTerm {
        record: MemoryRecord {
            id: MemoryId(row.get(0)?),
            owner: AgentId(row.get(1)?),
            content: row.get(2)?,
            importance: importance_from_sql(row.get(3)?),
            created_at: from_micros(row.get(4)?),
            access_count: row.get(5)?,
            tier: Tier::LongTerm,
            last_accessed: Some(from_micros(row.get(6)?)),
            reflection_kind: None,
        },
        kind: row.get(7)?,
    })
}

fn collect_long_term(
    rows: impl Iterator<Item = rusqlite::Result<RawLongTerm>>,
) -> Result<Vec<MemoryRecord>> {
    rows.map(|row| row.map_err(ReverieError::from).and_then(RawLongTerm::into_record))
        .collect()
}

type RawTurn = (String, i64, String, Option<String>, String, i64);

fn turn_row(row: &Row<'_>) -> rusqlite::Result<RawTurn> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn collect_turns(
    rows: impl Iterator<Item = rusqlite::Result<RawTurn>>,
) -> Result<Vec<ConversationTurn>> {
    let mut turns = Vec::new();
    for row in rows {
        let (conversation, turn, speaker, addressee, message, at) = row?;
        turns.push(ConversationTurn {
            conversation: parse_conversation(&conversation, "conversation_log")?,
            turn_number: from_sql_int(turn),
            speaker,
            addressee: addressee.map(AgentId),
            message,
            occurred_at: from_micros(at),
        });
    }
    Ok(turns)
}

fn parse_conversation(raw: &str, table: &'static str) -> Result<ConversationId> {
    uuid::Uuid::parse_str(raw)
        .map(ConversationId)
        .map_err(|e| ReverieError::CorruptRecord {
            table,
            reason: format!("invalid conversation id '{raw}': {e}"),
        })
}

// Emotion columns are written from f32 values clamped to [0, 1].
#[allow(clippy::cast_possible_truncation)]
fn emotion_row(row: &Row<'_>) -> rusqlite::Result<EmotionState> {
    let mut values = [0.0_f32; 8];
    for (i, slot) in values.iter_mut().enumerate() {
        *slot = row.get::<_, f64>(i + 2)? as f32;
    }
    Ok(EmotionState {
        owner: AgentId(row.get(0)?),
        recorded_at: from_micros(row.get(1)?),
        vector: EmotionVector::from_array(values),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

fn insert_turn(conn: &Connection, turn: &ConversationTurn) -> Result<()> {
    conn.prepare_cached(&format!(
        "INSERT INTO conversation_log ({TURN_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
    ))?
    .execute(params![
        turn.conversation.to_string(),
        to_sql_int(turn.turn_number),
        turn.speaker,
        turn.addressee.as_ref().map(AgentId::as_str),
        turn.message,
        micros(turn.occurred_at),
    ])?;
    debug!(
        conversation = %turn.conversation,
        turn = turn.turn_number,
        speaker = %turn.speaker,
        "Logged conversation turn"
    );
    Ok(())
}

fn insert_thought(conn: &Connection, thought: &ThoughtRecord) -> Result<()> {
    conn.prepare_cached(
        "INSERT INTO thought_log (agent, conversation, turn_number, thought, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?
    .execute(params![
        thought.agent.as_str(),
        thought.conversation.to_string(),
        to_sql_int(thought.turn_number),
        thought.thought,
        micros(thought.recorded_at),
    ])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ada() -> AgentId {
        AgentId::new("Ada")
    }

    #[test]
    fn short_term_round_trip_and_ordering() {
        let store = SqliteStore::open_in_memory().expect("open");
        let now = Utc::now();
        store
            .insert_short_term(&ada(), "older", 2.0, now - Duration::minutes(5))
            .expect("insert");
        store.insert_short_term(&ada(), "newer", 3.0, now).expect("insert");

        let recent = store.recent_short_term(&ada(), None).expect("recent");
        let contents: Vec<_> = recent.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["newer", "older"]);
        assert_eq!(store.count_short_term(&ada()).expect("count"), 2);
    }

    #[test]
    fn evicts_oldest_by_creation_time() {
        let store = SqliteStore::open_in_memory().expect("open");
        let now = Utc::now();
        store.insert_short_term(&ada(), "b", 1.0, now).expect("insert");
        let oldest = store
            .insert_short_term(&ada(), "a", 1.0, now - Duration::hours(1))
            .expect("insert");

        let evicted = store.evict_oldest_short_term(&ada()).expect("evict");
        assert_eq!(evicted, Some(oldest.id));
        assert_eq!(store.count_short_term(&ada()).expect("count"), 1);
    }

    #[test]
    fn promotion_moves_between_tiers() {
        let store = SqliteStore::open_in_memory().expect("open");
        let rec = store
            .insert_short_term(&ada(), "keep me", 8.0, Utc::now())
            .expect("insert");

        let promoted = store
            .promote_short_term(rec.id, Utc::now())
            .expect("promote")
            .expect("row existed");
        assert_eq!(promoted.tier, Tier::LongTerm);
        assert_eq!(promoted.content, "keep me");
        assert!(store.recent_short_term(&ada(), None).expect("stm").is_empty());
        assert_eq!(store.ranked_long_term(&ada(), None, true).expect("ltm").len(), 1);

        assert!(store.promote_short_term(rec.id, Utc::now()).expect("again").is_none());
    }

    #[test]
    fn ranked_long_term_can_exclude_reflections() {
        let store = SqliteStore::open_in_memory().expect("open");
        let now = Utc::now();
        store.insert_long_term(&ada(), "fact", 8.0, None, now).expect("insert");
        store
            .insert_long_term(&ada(), "insight", 10.0, Some(ReflectionKind::Lesson), now)
            .expect("insert");

        let all = store.ranked_long_term(&ada(), None, true).expect("all");
        assert_eq!(all[0].content, "insight");
        let facts = store.ranked_long_term(&ada(), None, false).expect("facts");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].content, "fact");

        let lesson = store
            .latest_reflection(&ada(), ReflectionKind::Lesson)
            .expect("lookup")
            .expect("present");
        assert_eq!(lesson.reflection_kind, Some(ReflectionKind::Lesson));
    }

    #[test]
    fn turns_are_filtered_by_participation() {
        let store = SqliteStore::open_in_memory().expect("open");
        let convo = ConversationId::new();
        for (n, speaker, to) in [(1, "Ada", "Bo"), (2, "Bo", "Ada"), (3, "Cy", "Di")] {
            store
                .append_turn(&ConversationTurn {
                    conversation: convo,
                    turn_number: n,
                    speaker: speaker.into(),
                    addressee: Some(AgentId::new(to)),
                    message: format!("message {n}"),
                    occurred_at: Utc::now(),
                })
                .expect("append");
        }

        let turns = store.turns_involving(&ada(), 10).expect("turns");
        assert_eq!(turns.iter().map(|t| t.turn_number).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(store.last_turn_number(convo).expect("max"), Some(3));
        assert_eq!(store.last_turn_number(ConversationId::new()).expect("max"), None);
    }

    #[test]
    fn exchange_is_all_or_nothing() {
        let store = SqliteStore::open_in_memory().expect("open");
        let convo = ConversationId::new();
        let turn = |n: u64, speaker: &str| ConversationTurn {
            conversation: convo,
            turn_number: n,
            speaker: speaker.into(),
            addressee: None,
            message: format!("message {n}"),
            occurred_at: Utc::now(),
        };
        let thought = ThoughtRecord {
            agent: AgentId::new("Bo"),
            conversation: convo,
            turn_number: 2,
            thought: "hm".into(),
            recorded_at: Utc::now(),
        };

        store.append_turn(&turn(2, "Cy")).expect("taken");
        assert!(store.append_turn(&turn(2, "Di")).is_err());
        assert!(store.append_exchange(&turn(1, "Ada"), &turn(2, "Bo"), &thought).is_err());

        let turns = store.turns_in(convo).expect("turns");
        assert_eq!(turns.iter().map(|t| t.turn_number).collect::<Vec<_>>(), vec![2]);
        assert!(store.thoughts_for(&AgentId::new("Bo"), 10).expect("thoughts").is_empty());

        store.append_exchange(&turn(3, "Ada"), &turn(4, "Bo"), &thought).expect("exchange");
        assert_eq!(store.turns_in(convo).expect("turns").len(), 3);
        assert_eq!(store.thoughts_for(&AgentId::new("Bo"), 10).expect("thoughts").len(), 1);
    }

    #[test]
    fn backup_copies_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(dir.path().join("live.db"), &PersistenceConfig::default())
            .expect("open");
        store.insert_short_term(&ada(), "saved", 1.0, Utc::now()).expect("insert");

        let dest = dir.path().join("copy.db");
        store.backup(&dest).expect("backup");
        let copy = SqliteStore::open(&dest, &PersistenceConfig::default()).expect("reopen");
        assert_eq!(copy.count_short_term(&ada()).expect("count"), 1);
    }
}

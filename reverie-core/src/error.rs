//! Error types for the Reverie core library.

use thiserror::Error;

/// Top-level error type for all core memory and emotion operations.
#[derive(Error, Debug)]
pub enum ReverieError {
    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The embedding provider could not produce a vector.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The sentiment analyzer could not score a text.
    #[error("Sentiment error: {0}")]
    Sentiment(String),

    /// A stored row could not be mapped back into a record.
    #[error("Corrupt record in {table}: {reason}")]
    CorruptRecord {
        /// Table the row came from.
        table: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, ReverieError>;

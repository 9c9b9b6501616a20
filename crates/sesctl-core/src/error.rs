//! Error types for sesctl-core.

use thiserror::Error;

/// Result type alias using sesctl-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for session operations
#[derive(Error, Debug)]
pub enum Error {
    // Input validation
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("lastAccessed {last_accessed} precedes createdAt {created_at}")]
    NonMonotonicTimestamp {
        created_at: String,
        last_accessed: String,
    },

    // Lookup failures
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already exists: {0}")]
    SessionExists(String),

    // Stored data integrity
    #[error("Corrupt timestamp in session {session_id}: {value:?}")]
    CorruptTimestamp { session_id: String, value: String },

    #[error("Corrupt status in session {session_id}: {value:?}")]
    CorruptStatus { session_id: String, value: String },

    // Storage backend
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors caused by the caller's input rather than server state.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::MissingField(_)
                | Error::InvalidTimestamp(_)
                | Error::NonMonotonicTimestamp { .. }
        )
    }

    /// True for records whose stored form can no longer be decoded.
    pub fn is_corrupt_record(&self) -> bool {
        matches!(
            self,
            Error::CorruptTimestamp { .. } | Error::CorruptStatus { .. }
        )
    }

    /// True when the storage backend itself is unavailable.
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, Error::Database(_) | Error::LockPoisoned | Error::Io(_))
    }
}

//! Unified error types for the signage client.
//!
//! `Error` is `Clone` so a single coalesced cache fill can hand the same
//! outcome to every waiter.

use std::sync::Arc;

use tokio_rusqlite::rusqlite;

/// Failure reported by a remote collaborator (content API, weather API, image host).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Non-success HTTP status.
    #[error("HTTP error: {status}")]
    Http { status: u16 },

    /// Request timed out.
    #[error("request timeout")]
    Timeout,

    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// Response body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// Request target could not be turned into an http(s) URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Response body exceeded the configured limit.
    #[error("response too large: {size} bytes exceeds {limit}")]
    TooLarge { size: u64, limit: u64 },
}

/// Unified error type for the core.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Empty or malformed cache key. Never retried.
    #[error("INVALID_KEY: {0}")]
    InvalidKey(String),

    /// Remote data unavailable or malformed. Retried on the next tick.
    #[error("FETCH_FAILED: {0}")]
    Fetch(#[from] FetchError),

    /// Disk tier read/write fault.
    #[error("IO_ERROR: {0}")]
    Io(Arc<std::io::Error>),

    /// SQLite disk tier failure.
    #[error("STORAGE_ERROR: {0}")]
    Storage(String),

    /// Migration failed to apply.
    #[error("STORAGE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Invalid input parameters.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Operation not allowed in the current lifecycle state.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),
}

impl Error {
    /// Whether this error came from the disk tier rather than the network.
    pub fn is_disk_fault(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Storage(_) | Error::MigrationFailed(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            other => Error::Storage(other.to_string()),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

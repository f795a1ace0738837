//! Unified error types for cache stores.

use std::path::PathBuf;

use tokio_rusqlite::rusqlite;

/// Errors raised by store adapters.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Schema migration failed to apply.
    #[error("STORE_ERROR: schema migration failed: {0}")]
    SchemaMigration(String),

    /// No store database exists at the given path.
    #[error("STORE_MISSING: {}", .0.display())]
    StoreMissing(PathBuf),

    /// A destination store already holds entries.
    #[error("DESTINATION_NOT_EMPTY: {} holds {count} entries", path.display())]
    DestinationNotEmpty { path: PathBuf, count: u64 },

    /// The store was used after `close`.
    #[error("STORE_CLOSED")]
    StoreClosed,

    /// Filesystem error while preparing a store location.
    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),

    /// A stored expiration is outside the representable range.
    #[error("INVALID_TIMESTAMP: {0} microseconds")]
    InvalidTimestamp(i64),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::StoreClosed,
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        match err {
            tokio_rusqlite::Error::ConnectionClosed => Error::StoreClosed,
            other => Error::Database(other),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

//! Store handle lifecycle: opening, creating, and closing SQLite stores.
//!
//! A store lives in a directory holding one database file. Writable opens apply
//! the performance pragmas and bring the schema up to date; existing stores are
//! opened read-only and only have their schema checked.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::OpenFlags;

use super::{Store, schema};
use crate::Error;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;";

/// SQLite-backed cache store.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Clones share the same connection and close state.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pub(crate) conn: Connection,
    location: Option<PathBuf>,
    closed: Arc<AtomicBool>,
}

impl SqliteStore {
    /// Open a database file, creating it if it doesn't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).await.map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn, Some(path)).await
    }

    /// Open the store kept in `dir` read-only. The database must already exist
    /// and carry a supported store schema; nothing is written to it.
    pub async fn open_existing(dir: impl AsRef<Path>, file_name: &str) -> Result<Self, Error> {
        let path = dir.as_ref().join(file_name);
        if store_file_len(&path).await?.is_none() {
            return Err(Error::StoreMissing(path));
        }
        Self::open_read_only(path).await
    }

    async fn open_read_only(path: PathBuf) -> Result<Self, Error> {
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .await
        .map_err(|e| Error::Database(e.into()))?;

        schema::check_supported(&conn).await?;

        Ok(Self { conn, location: Some(path), closed: Arc::new(AtomicBool::new(false)) })
    }

    /// Create an empty store in `dir`, creating the directory when needed.
    ///
    /// An existing database is accepted only if it holds no entries, so an
    /// interrupted run can be retried against the same empty location.
    pub async fn create_fresh(dir: impl AsRef<Path>, file_name: &str) -> Result<Self, Error> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        let path = dir.join(file_name);
        if store_file_len(&path).await?.is_some_and(|len| len > 0) {
            // Refuse foreign databases before anything writes to them.
            Self::open_read_only(path.clone()).await?.close().await?;
        }

        let store = Self::open(path).await?;
        let count = store.count().await?;
        if count > 0 {
            store.close().await?;
            return Err(Error::DestinationNotEmpty { path: dir.to_path_buf(), count });
        }
        Ok(store)
    }

    /// Open an in-memory database for testing.
    ///
    /// Creates a temporary in-memory SQLite database with the same
    /// pragma configuration and schema as file-based stores.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn, None).await
    }

    async fn prepare(conn: Connection, location: Option<PathBuf>) -> Result<Self, Error> {
        conn.call(|conn| conn.execute_batch(PRAGMAS))
            .await
            .map_err(Error::Database)?;

        schema::apply_pending(&conn).await?;

        Ok(Self { conn, location, closed: Arc::new(AtomicBool::new(false)) })
    }

    /// Database file backing this store; `None` for in-memory stores.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> Result<(), Error> {
        if self.is_closed() { Err(Error::StoreClosed) } else { Ok(()) }
    }

    /// Close the background connection once; later calls are no-ops.
    pub(crate) async fn shutdown(&self) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match self.conn.clone().close().await {
            Ok(()) | Err(tokio_rusqlite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(Error::Database(e)),
        }
    }
}

/// Size of the database file at `path`, `None` when there is no such file.
async fn store_file_len(path: &Path) -> Result<Option<u64>, Error> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}

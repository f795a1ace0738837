//! Store schema versioning.
//!
//! Each schema version is a SQL batch applied once and recorded in the
//! `_migrations` table, so opening an up-to-date store applies nothing.

use tokio_rusqlite::{Connection, params};

use super::Error;

/// Schema batches in application order: (version, SQL).
///
/// Every batch uses CREATE ... IF NOT EXISTS so a half-recorded version can be
/// replayed safely.
const SCHEMA: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_entries.sql"))];

/// Highest schema version this build knows about.
pub fn latest_version() -> i64 {
    SCHEMA.last().map_or(0, |(version, _)| *version)
}

/// Apply every schema version newer than the one recorded in the database.
///
/// # Errors
///
/// Returns `Error::SchemaMigration` if the store was written by a newer build,
/// and a database error if a batch fails to execute.
pub async fn apply_pending(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        if current > latest_version() {
            return Err(Error::SchemaMigration(format!(
                "store schema version {current} is newer than supported version {}",
                latest_version()
            )));
        }

        for (version, sql) in SCHEMA.iter().filter(|(version, _)| *version > current) {
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tracing::debug!(version, "applied store schema version");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

/// Check that a store opened read-only carries a schema this build can read.
///
/// # Errors
///
/// Returns `Error::SchemaMigration` when the database has no recorded schema,
/// was written by a newer build, or lacks the `entries` table.
pub async fn check_supported(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let table_exists = |name: &str| -> Result<bool, Error> {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
                params![name],
                |row| row.get(0),
            )?;
            Ok(exists)
        };

        if !table_exists("_migrations")? {
            return Err(Error::SchemaMigration("database is not a cache store: no schema version recorded".into()));
        }

        let current: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;
        if current == 0 {
            return Err(Error::SchemaMigration("database is not a cache store: no schema version recorded".into()));
        }
        if current > latest_version() {
            return Err(Error::SchemaMigration(format!(
                "store schema version {current} is newer than supported version {}",
                latest_version()
            )));
        }

        if !table_exists("entries")? {
            return Err(Error::SchemaMigration(format!(
                "store schema version {current} recorded but the entries table is missing"
            )));
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

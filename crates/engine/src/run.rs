//! Run orchestration.
//!
//! Opens the stores, runs migration then verification, builds the summary,
//! and closes both stores on every path out.

use std::path::Path;

use cachemig_core::{MigrateConfig, SqliteStore, Store};

use crate::driver::{MigrationResult, Migrator};
use crate::error::RunError;
use crate::observer::MigrationObserver;
use crate::report::{Summary, evaluate};
use crate::verify::{VerificationResult, Verifier};

/// Tunables for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub page_size: usize,
    pub check_key_count: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from(&MigrateConfig::default())
    }
}

impl From<&MigrateConfig> for RunOptions {
    fn from(config: &MigrateConfig) -> Self {
        Self { page_size: config.page_size, check_key_count: config.check_key_count }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// `None` for verify-only runs.
    pub migration: Option<MigrationResult>,
    /// `None` when migration failed and verification was skipped.
    pub verification: Option<VerificationResult>,
    pub summary: Summary,
}

impl RunReport {
    fn new(migration: Option<MigrationResult>, verification: Option<VerificationResult>) -> Self {
        let summary = Summary::new(migration.as_ref(), verification.as_ref());
        Self { migration, verification, summary }
    }

    /// The terminal error of this run, if it failed.
    pub fn outcome(&self) -> Result<(), RunError> {
        evaluate(self.migration.as_ref(), self.verification.as_ref())
    }
}

/// Migrate `source` into `destination`, then verify the copy.
///
/// Verification only runs after a fault-free migration. Neither store is
/// closed here; the caller owns them.
pub async fn migrate_and_verify(
    source: &dyn Store, destination: &dyn Store, options: RunOptions, observer: &dyn MigrationObserver,
) -> RunReport {
    let migration = Migrator::new(observer, options.page_size)
        .migrate(source, destination)
        .await;

    let verification = if migration.is_clean() {
        let verifier = Verifier::new(observer, options.page_size).with_key_count_check(options.check_key_count);
        Some(verifier.verify(source, destination).await)
    } else {
        observer.verification_skipped("migration aborted on a store fault");
        None
    };

    RunReport::new(Some(migration), verification)
}

/// Full migrate-and-verify cycle between two store directories.
///
/// The source must exist; the destination is created and must not already
/// hold entries. Errors are returned only when a store cannot be opened or
/// closed; pass outcomes live in the returned report.
pub async fn run_cycle(
    source_dir: &Path, destination_dir: &Path, config: &MigrateConfig, observer: &dyn MigrationObserver,
) -> Result<RunReport, RunError> {
    let source = SqliteStore::open_existing(source_dir, &config.db_file_name)
        .await
        .map_err(RunError::OpenSource)?;

    let destination = match SqliteStore::create_fresh(destination_dir, &config.db_file_name).await {
        Ok(store) => store,
        Err(e) => {
            close_logged(&source, "source").await;
            return Err(RunError::OpenDestination(e));
        }
    };

    let report = migrate_and_verify(&source, &destination, RunOptions::from(config), observer).await;
    close_both(&source, &destination).await?;
    Ok(report)
}

/// Verification pass alone, against two existing store directories.
pub async fn run_verify_only(
    source_dir: &Path, destination_dir: &Path, config: &MigrateConfig, observer: &dyn MigrationObserver,
) -> Result<RunReport, RunError> {
    let source = SqliteStore::open_existing(source_dir, &config.db_file_name)
        .await
        .map_err(RunError::OpenSource)?;

    let destination = match SqliteStore::open_existing(destination_dir, &config.db_file_name).await {
        Ok(store) => store,
        Err(e) => {
            close_logged(&source, "source").await;
            return Err(RunError::OpenDestination(e));
        }
    };

    let verification = Verifier::new(observer, config.page_size)
        .with_key_count_check(config.check_key_count)
        .verify(&source, &destination)
        .await;
    close_both(&source, &destination).await?;

    Ok(RunReport::new(None, Some(verification)))
}

/// Close both stores, attempting the second even if the first fails.
async fn close_both(source: &dyn Store, destination: &dyn Store) -> Result<(), RunError> {
    let source_closed = source.close().await;
    let destination_closed = destination.close().await;
    source_closed.and(destination_closed).map_err(RunError::Close)
}

async fn close_logged(store: &dyn Store, role: &str) {
    if let Err(e) = store.close().await {
        tracing::warn!(role, error = %e, "failed to close store");
    }
}

//! Migration driver.
//!
//! Copies every entry of a source store into a fresh destination store, one
//! key at a time. A key that disappears between enumeration and read is
//! skipped; any other store fault aborts the whole migration, because a
//! partially written destination is never trusted for verification.

use std::fmt;

use cachemig_core::{Key, KeyStream, Store};
use serde::Serialize;

use crate::observer::{MigrationObserver, Stage};

/// Where a store fault happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultStage {
    /// Listing source keys.
    Enumerate,
    /// Reading an entry from the source.
    SourceRead,
    /// Writing an entry to the destination.
    DestinationWrite,
    /// Reading an entry back from the destination.
    DestinationRead,
}

impl fmt::Display for FaultStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FaultStage::Enumerate => "enumerate",
            FaultStage::SourceRead => "source read",
            FaultStage::DestinationWrite => "destination write",
            FaultStage::DestinationRead => "destination read",
        };
        f.write_str(label)
    }
}

/// A store fault that terminated a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    pub stage: FaultStage,
    /// `None` when the fault happened while listing keys.
    pub key: Option<Key>,
    pub message: String,
}

impl Fault {
    pub fn new(stage: FaultStage, key: Option<&Key>, err: &cachemig_core::Error) -> Self {
        Self { stage, key: key.cloned(), message: err.to_string() }
    }

    /// Key for log output; enumeration faults have none.
    pub fn key_label(&self) -> String {
        self.key.as_ref().map_or_else(|| "<enumeration>".to_string(), Key::to_string)
    }
}

/// Outcome of one migration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationResult {
    pub keys_seen: u64,
    pub migrated: u64,
    /// Keys listed by the source that were gone by the time they were read.
    pub vanished: u64,
    pub failed: u64,
    pub first_error: Option<Fault>,
}

impl MigrationResult {
    /// True when the pass ran to completion without a fault.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.first_error.is_none()
    }

    fn record_fault(&mut self, fault: Fault) {
        self.failed += 1;
        self.first_error.get_or_insert(fault);
    }
}

/// Sequential, fail-fast entry copier.
pub struct Migrator<'a> {
    observer: &'a dyn MigrationObserver,
    page_size: usize,
}

impl<'a> Migrator<'a> {
    pub fn new(observer: &'a dyn MigrationObserver, page_size: usize) -> Self {
        Self { observer, page_size }
    }

    /// Copy every entry from `source` into `destination`.
    ///
    /// The source is only read. Returns as soon as any store call fails, with
    /// the fault recorded in `first_error`.
    pub async fn migrate(&self, source: &dyn Store, destination: &dyn Store) -> MigrationResult {
        let mut result = MigrationResult::default();
        self.observer.stage_started(Stage::Migrate);

        let mut keys = KeyStream::new(source, self.page_size);
        loop {
            let key = match keys.next_key().await {
                Ok(Some(key)) => key,
                Ok(None) => break,
                Err(e) => {
                    self.abort(&mut result, Fault::new(FaultStage::Enumerate, None, &e));
                    return result;
                }
            };
            result.keys_seen += 1;

            let entry = match source.get(&key).await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    result.vanished += 1;
                    self.observer.key_vanished(&key);
                    continue;
                }
                Err(e) => {
                    self.abort(&mut result, Fault::new(FaultStage::SourceRead, Some(&key), &e));
                    return result;
                }
            };

            if let Err(e) = destination.set(&key, &entry).await {
                self.abort(&mut result, Fault::new(FaultStage::DestinationWrite, Some(&key), &e));
                return result;
            }

            result.migrated += 1;
            self.observer.key_migrated(&key, &entry);
        }

        self.observer.stage_finished(Stage::Migrate, result.migrated);
        result
    }

    fn abort(&self, result: &mut MigrationResult, fault: Fault) {
        self.observer.key_faulted(&fault);
        result.record_fault(fault);
        self.observer.stage_aborted(Stage::Migrate);
    }
}

//! Run event reporting.
//!
//! The driver and the verification pass report every key-level and stage-level
//! event through a `MigrationObserver` handed to them, rather than writing to a
//! global logger. `TracingObserver` is the production implementation.

use std::fmt;

use cachemig_core::{Entry, Key};

use crate::driver::Fault;
use crate::verify::{KeyCountCheck, Mismatch};

/// Pass currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Migrate,
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Migrate => f.write_str("migration"),
            Stage::Verify => f.write_str("verification"),
        }
    }
}

/// Receiver for run events. Every method defaults to doing nothing.
pub trait MigrationObserver: Send + Sync {
    fn stage_started(&self, _stage: Stage) {}

    /// `processed` is the number of keys migrated or verified.
    fn stage_finished(&self, _stage: Stage, _processed: u64) {}

    fn stage_aborted(&self, _stage: Stage) {}

    fn key_migrated(&self, _key: &Key, _entry: &Entry) {}

    fn key_vanished(&self, _key: &Key) {}

    fn key_faulted(&self, _fault: &Fault) {}

    fn key_verified(&self, _key: &Key) {}

    fn mismatch_found(&self, _mismatch: &Mismatch) {}

    fn key_counts_checked(&self, _check: &KeyCountCheck) {}

    fn verification_skipped(&self, _reason: &str) {}
}

/// Emits one `tracing` event per run event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl MigrationObserver for TracingObserver {
    fn stage_started(&self, stage: Stage) {
        tracing::info!(%stage, "stage started");
    }

    fn stage_finished(&self, stage: Stage, processed: u64) {
        tracing::info!(%stage, processed, "stage finished");
    }

    fn stage_aborted(&self, stage: Stage) {
        tracing::error!(%stage, "stage aborted on first fault");
    }

    fn key_migrated(&self, key: &Key, entry: &Entry) {
        tracing::info!(
            %key,
            bytes = entry.value.len(),
            sha256 = %entry.fingerprint(),
            expire_at = ?entry.expire_at.map(|at| at.to_rfc3339()),
            tag = ?entry.tag,
            "migrated"
        );
    }

    fn key_vanished(&self, key: &Key) {
        tracing::warn!(%key, "key vanished before it could be read; skipping");
    }

    fn key_faulted(&self, fault: &Fault) {
        tracing::error!(key = %fault.key_label(), stage = %fault.stage, error = %fault.message, "store fault");
    }

    fn key_verified(&self, key: &Key) {
        tracing::info!(%key, "verified");
    }

    fn mismatch_found(&self, mismatch: &Mismatch) {
        tracing::error!(key = %mismatch.key, field = %mismatch.field, detail = %mismatch.detail, "mismatch");
    }

    fn key_counts_checked(&self, check: &KeyCountCheck) {
        if check.matches() {
            tracing::info!(source = check.source, destination = check.destination, "key counts match");
        } else {
            tracing::error!(source = check.source, destination = check.destination, "key counts differ");
        }
    }

    fn verification_skipped(&self, reason: &str) {
        tracing::warn!(reason, "verification skipped");
    }
}

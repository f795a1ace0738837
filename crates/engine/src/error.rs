//! Run-level error taxonomy.
//!
//! Every variant is terminal: the run reports it and exits non-zero. A failed
//! run is retried from scratch against a new destination, never resumed.

use cachemig_core::Key;

use crate::driver::{Fault, FaultStage};
use crate::verify::{EntryField, KeyCountCheck, Mismatch};

/// Reason a migration run did not produce a verified replica.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Listing or reading the source failed.
    #[error("SOURCE_READ_FAULT: key {key}: {message}")]
    SourceReadFault { key: String, message: String },

    /// Writing to the destination failed.
    #[error("DESTINATION_WRITE_FAULT: key {key}: {message}")]
    DestinationWriteFault { key: String, message: String },

    /// Reading the destination back during verification failed.
    #[error("DESTINATION_READ_FAULT: key {key}: {message}")]
    DestinationReadFault { key: String, message: String },

    /// A key holds different data in the two stores.
    #[error("VERIFICATION_MISMATCH: key {key}, field {field}: {detail}")]
    VerificationMismatch { key: Key, field: EntryField, detail: String },

    /// A key is present in one store only.
    #[error("VERIFICATION_MISSING_KEY: key {key} {detail}")]
    VerificationMissingKey { key: Key, detail: String },

    /// Per-key checks passed but the stores hold different numbers of entries.
    #[error("KEY_COUNT_MISMATCH: source holds {source_count} entries, destination holds {destination_count}")]
    KeyCountMismatch { source_count: u64, destination_count: u64 },

    /// Migration failed, so the destination was never verified.
    #[error("VERIFICATION_SKIPPED: migration did not complete")]
    VerificationSkipped,

    /// The source store could not be opened.
    #[error("OPEN_SOURCE_FAILED: {0}")]
    OpenSource(#[source] cachemig_core::Error),

    /// The destination store could not be created.
    #[error("OPEN_DESTINATION_FAILED: {0}")]
    OpenDestination(#[source] cachemig_core::Error),

    /// A store could not release its resources.
    #[error("CLOSE_FAILED: {0}")]
    Close(#[source] cachemig_core::Error),
}

impl From<&Fault> for RunError {
    fn from(fault: &Fault) -> Self {
        let key = fault.key_label();
        let message = fault.message.clone();
        match fault.stage {
            FaultStage::Enumerate | FaultStage::SourceRead => RunError::SourceReadFault { key, message },
            FaultStage::DestinationWrite => RunError::DestinationWriteFault { key, message },
            FaultStage::DestinationRead => RunError::DestinationReadFault { key, message },
        }
    }
}

impl From<&Mismatch> for RunError {
    fn from(mismatch: &Mismatch) -> Self {
        match mismatch.field {
            EntryField::Presence => {
                RunError::VerificationMissingKey { key: mismatch.key.clone(), detail: mismatch.detail.clone() }
            }
            field => RunError::VerificationMismatch {
                key: mismatch.key.clone(),
                field,
                detail: mismatch.detail.clone(),
            },
        }
    }
}

impl From<KeyCountCheck> for RunError {
    fn from(check: KeyCountCheck) -> Self {
        RunError::KeyCountMismatch { source_count: check.source, destination_count: check.destination }
    }
}

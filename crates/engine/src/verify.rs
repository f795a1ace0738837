//! Verification pass.
//!
//! Re-enumerates the source with a fresh key stream and compares every entry
//! against the destination: presence first, then value, expiration and tag,
//! stopping at the first difference.

use std::fmt;

use cachemig_core::store::digest::short_digest;
use cachemig_core::{Entry, Key, KeyStream, Store};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::driver::{Fault, FaultStage};
use crate::observer::{MigrationObserver, Stage};

/// Entry field that differed between the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryField {
    Presence,
    Value,
    Expiration,
    Tag,
}

impl fmt::Display for EntryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntryField::Presence => "presence",
            EntryField::Value => "value",
            EntryField::Expiration => "expiration",
            EntryField::Tag => "tag",
        };
        f.write_str(label)
    }
}

/// First difference found between source and destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub key: Key,
    pub field: EntryField,
    /// Human-readable description of both sides.
    pub detail: String,
}

/// Entry counts of both stores, taken after a clean per-key pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyCountCheck {
    pub source: u64,
    pub destination: u64,
}

impl KeyCountCheck {
    pub fn matches(&self) -> bool {
        self.source == self.destination
    }
}

/// Outcome of one verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub verified: u64,
    pub mismatch: Option<Mismatch>,
    pub fault: Option<Fault>,
    /// Present only when the count check was enabled and reached.
    pub key_counts: Option<KeyCountCheck>,
}

impl VerificationResult {
    /// True when every examined key matched and no store call failed.
    pub fn is_clean(&self) -> bool {
        self.mismatch.is_none() && self.fault.is_none() && self.key_counts.is_none_or(|check| check.matches())
    }
}

fn describe_expiration(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "never".to_string(), |at| at.to_rfc3339())
}

/// Compare two entries field by field in the order value, expiration, tag.
pub fn compare_entries(key: &Key, source: &Entry, destination: &Entry) -> Option<Mismatch> {
    let (field, detail) = if source.value != destination.value {
        (
            EntryField::Value,
            format!(
                "source {} bytes sha256 {}, destination {} bytes sha256 {}",
                source.value.len(),
                short_digest(&source.value),
                destination.value.len(),
                short_digest(&destination.value)
            ),
        )
    } else if source.expire_at != destination.expire_at {
        (
            EntryField::Expiration,
            format!(
                "source {}, destination {}",
                describe_expiration(source.expire_at),
                describe_expiration(destination.expire_at)
            ),
        )
    } else if source.tag != destination.tag {
        (EntryField::Tag, format!("source {:?}, destination {:?}", source.tag, destination.tag))
    } else {
        return None;
    };

    Some(Mismatch { key: key.clone(), field, detail })
}

/// Read-only comparison of two stores, driven by the source key set.
pub struct Verifier<'a> {
    observer: &'a dyn MigrationObserver,
    page_size: usize,
    check_key_count: bool,
}

impl<'a> Verifier<'a> {
    pub fn new(observer: &'a dyn MigrationObserver, page_size: usize) -> Self {
        Self { observer, page_size, check_key_count: false }
    }

    /// Also compare total entry counts once every source key has matched.
    pub fn with_key_count_check(mut self, enabled: bool) -> Self {
        self.check_key_count = enabled;
        self
    }

    /// Compare every source key against `destination`, stopping at the first
    /// mismatch or store fault.
    pub async fn verify(&self, source: &dyn Store, destination: &dyn Store) -> VerificationResult {
        let mut result = VerificationResult::default();
        self.observer.stage_started(Stage::Verify);

        let mut keys = KeyStream::new(source, self.page_size);
        loop {
            let key = match keys.next_key().await {
                Ok(Some(key)) => key,
                Ok(None) => break,
                Err(e) => return self.fault(result, Fault::new(FaultStage::Enumerate, None, &e)),
            };

            let source_entry = match source.get(&key).await {
                Ok(entry) => entry,
                Err(e) => return self.fault(result, Fault::new(FaultStage::SourceRead, Some(&key), &e)),
            };
            let destination_entry = match destination.get(&key).await {
                Ok(entry) => entry,
                Err(e) => return self.fault(result, Fault::new(FaultStage::DestinationRead, Some(&key), &e)),
            };

            let mismatch = match (&source_entry, &destination_entry) {
                (None, _) => Some(Mismatch {
                    key: key.clone(),
                    field: EntryField::Presence,
                    detail: "missing from source".into(),
                }),
                (Some(_), None) => Some(Mismatch {
                    key: key.clone(),
                    field: EntryField::Presence,
                    detail: "missing from destination".into(),
                }),
                (Some(src), Some(dst)) => compare_entries(&key, src, dst),
            };

            if let Some(mismatch) = mismatch {
                self.observer.mismatch_found(&mismatch);
                self.observer.stage_aborted(Stage::Verify);
                result.mismatch = Some(mismatch);
                return result;
            }

            result.verified += 1;
            self.observer.key_verified(&key);
        }

        if self.check_key_count {
            let counts = match (source.count().await, destination.count().await) {
                (Ok(source), Ok(destination)) => KeyCountCheck { source, destination },
                (Err(e), _) => return self.fault(result, Fault::new(FaultStage::SourceRead, None, &e)),
                (_, Err(e)) => return self.fault(result, Fault::new(FaultStage::DestinationRead, None, &e)),
            };
            self.observer.key_counts_checked(&counts);
            result.key_counts = Some(counts);
        }

        self.observer.stage_finished(Stage::Verify, result.verified);
        result
    }

    fn fault(&self, mut result: VerificationResult, fault: Fault) -> VerificationResult {
        self.observer.key_faulted(&fault);
        self.observer.stage_aborted(Stage::Verify);
        result.fault = Some(fault);
        result
    }
}

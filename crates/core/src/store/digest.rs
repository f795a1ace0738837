//! Content fingerprints for log lines and mismatch reports.

use sha2::{Digest, Sha256};

/// SHA-256 of a stored value, hex encoded.
pub fn value_digest(value: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value);
    hex::encode(hasher.finalize())
}

/// First 12 hex characters of [`value_digest`], enough to eyeball a log line.
pub fn short_digest(value: &[u8]) -> String {
    let mut digest = value_digest(value);
    digest.truncate(12);
    digest
}

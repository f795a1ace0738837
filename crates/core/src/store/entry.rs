//! Entry and key types.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Serialize, Serializer};

use super::digest::short_digest;

/// Opaque cache key.
///
/// Keys are byte strings. They display as text when they are valid UTF-8 and
/// as `0x`-prefixed hex otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Vec<u8>);

impl Key {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) => f.write_str(text),
            Err(_) => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<Vec<u8>> for Key {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for Key {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

/// A stored cache record.
///
/// Expirations carry microsecond precision; anything finer is dropped when the
/// entry is written, so build them with [`Entry::expiring_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub value: Vec<u8>,
    /// Absolute expiry; `None` never expires.
    pub expire_at: Option<DateTime<Utc>>,
    pub tag: Option<String>,
}

impl Entry {
    /// An entry that never expires and carries no tag.
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self { value: value.into(), expire_at: None, tag: None }
    }

    pub fn expiring_at(mut self, at: DateTime<Utc>) -> Self {
        self.expire_at = Some(at.trunc_subsecs(6));
        self
    }

    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Short value fingerprint for log output.
    pub fn fingerprint(&self) -> String {
        short_digest(&self.value)
    }
}

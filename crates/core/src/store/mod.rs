//! Key-value cache stores.
//!
//! A store holds entries made of a binary value, an optional absolute
//! expiration, and an optional tag. It supports:
//!
//! - Lazy, paginated key enumeration (`KeyStream`)
//! - Atomic whole-entry writes
//! - Idempotent close
//!
//! `SqliteStore` is the on-disk implementation; anything else that can honour
//! the `Store` contract can take part in a migration.

pub mod connection;
pub mod digest;
pub mod entries;
pub mod entry;
pub mod schema;

use std::collections::VecDeque;

use async_trait::async_trait;

pub use crate::Error;

pub use connection::SqliteStore;
pub use entry::{Entry, Key};

/// Opaque position inside a key enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor(pub i64);

/// One page of keys returned by [`Store::scan_keys`].
#[derive(Debug, Clone, Default)]
pub struct KeyPage {
    pub keys: Vec<Key>,
    /// Where the next page starts, or `None` when enumeration is finished.
    pub next: Option<ScanCursor>,
}

/// Contract every cache backend taking part in a migration must satisfy.
///
/// Callers must not assume a key listed by `scan_keys` is still readable:
/// `get` reports a vanished key as `Ok(None)`, not as an error.
#[async_trait]
pub trait Store: Send + Sync {
    /// Return up to `limit` keys positioned after `after`.
    async fn scan_keys(&self, after: Option<ScanCursor>, limit: usize) -> Result<KeyPage, Error>;

    /// Read the full entry stored under `key`.
    async fn get(&self, key: &Key) -> Result<Option<Entry>, Error>;

    /// Write or overwrite `key`. Value, expiration and tag are applied together.
    async fn set(&self, key: &Key, entry: &Entry) -> Result<(), Error>;

    /// Number of entries currently stored.
    async fn count(&self) -> Result<u64, Error>;

    /// Release the underlying resources. Calling it again is a no-op.
    async fn close(&self) -> Result<(), Error>;

    /// Start a fresh lazy enumeration of every key.
    fn iter_keys(&self, page_size: usize) -> KeyStream<'_>
    where
        Self: Sized,
    {
        KeyStream::new(self, page_size)
    }
}

/// Lazy key enumeration over a [`Store`], fetched one page at a time.
///
/// A stream is finite and cannot be rewound; start another one to enumerate
/// again.
pub struct KeyStream<'a> {
    store: &'a dyn Store,
    page_size: usize,
    buffered: VecDeque<Key>,
    cursor: Option<ScanCursor>,
    exhausted: bool,
}

impl<'a> KeyStream<'a> {
    pub fn new(store: &'a dyn Store, page_size: usize) -> Self {
        Self { store, page_size: page_size.max(1), buffered: VecDeque::new(), cursor: None, exhausted: false }
    }

    /// Yield the next key, or `None` once the store has been fully enumerated.
    pub async fn next_key(&mut self) -> Result<Option<Key>, Error> {
        loop {
            if let Some(key) = self.buffered.pop_front() {
                return Ok(Some(key));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page = self.store.scan_keys(self.cursor, self.page_size).await?;
            self.exhausted = page.next.is_none();
            self.cursor = page.next;
            self.buffered.extend(page.keys);
        }
    }
}

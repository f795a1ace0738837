//! Entry reads and writes for `SqliteStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::{params, rusqlite};

use super::connection::SqliteStore;
use super::{Entry, Key, KeyPage, ScanCursor, Store};
use crate::Error;

fn expiration_from_micros(micros: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::<Utc>::from_timestamp_micros(micros).ok_or(Error::InvalidTimestamp(micros))
}

#[async_trait]
impl Store for SqliteStore {
    async fn scan_keys(&self, after: Option<ScanCursor>, limit: usize) -> Result<KeyPage, Error> {
        self.ensure_open()?;
        let after = after.map_or(i64::MIN, |cursor| cursor.0);
        let limit = i64::try_from(limit.max(1)).unwrap_or(i64::MAX);

        self.conn
            .call(move |conn| -> Result<KeyPage, Error> {
                let mut stmt = conn.prepare("SELECT id, key FROM entries WHERE id > ?1 ORDER BY id LIMIT ?2")?;
                let rows = stmt.query_map(params![after, limit], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?;

                let mut keys = Vec::new();
                let mut last_id = None;
                for row in rows {
                    let (id, key) = row?;
                    last_id = Some(id);
                    keys.push(Key::from(key));
                }

                let full_page = keys.len() as i64 == limit;
                let next = if full_page { last_id.map(ScanCursor) } else { None };
                Ok(KeyPage { keys, next })
            })
            .await
            .map_err(Error::from)
    }

    /// Returns None if the key doesn't exist in the store.
    async fn get(&self, key: &Key) -> Result<Option<Entry>, Error> {
        self.ensure_open()?;
        let key = key.as_bytes().to_vec();
        self.conn
            .call(move |conn| -> Result<Option<Entry>, Error> {
                let mut stmt = conn.prepare("SELECT value, expire_at, tag FROM entries WHERE key = ?1")?;

                let result = stmt.query_row(params![key], |row| {
                    Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Option<i64>>(1)?, row.get::<_, Option<String>>(2)?))
                });

                match result {
                    Ok((value, expire_at, tag)) => {
                        let expire_at = expire_at.map(expiration_from_micros).transpose()?;
                        Ok(Some(Entry { value, expire_at, tag }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Uses UPSERT semantics: one statement writes value, expiration and tag.
    async fn set(&self, key: &Key, entry: &Entry) -> Result<(), Error> {
        self.ensure_open()?;
        let key = key.as_bytes().to_vec();
        let value = entry.value.clone();
        let expire_at = entry.expire_at.map(|at| at.timestamp_micros());
        let tag = entry.tag.clone();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (key, value, expire_at, tag)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        expire_at = excluded.expire_at,
                        tag = excluded.tag",
                    params![key, value, expire_at, tag],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn count(&self) -> Result<u64, Error> {
        self.ensure_open()?;
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn close(&self) -> Result<(), Error> {
        self.shutdown().await
    }
}

impl SqliteStore {
    /// Delete a single entry.
    ///
    /// Returns true if the key existed.
    pub async fn remove(&self, key: &Key) -> Result<bool, Error> {
        self.ensure_open()?;
        let key = key.as_bytes().to_vec();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Count entries whose expiration is at or before `now`.
    pub async fn count_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        self.ensure_open()?;
        let now = now.timestamp_micros();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE expire_at IS NOT NULL AND expire_at <= ?1",
                    params![now],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

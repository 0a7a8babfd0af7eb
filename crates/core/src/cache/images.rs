//! Image entry operations.
//!
//! Stores downloaded meme payloads with their resolved extension, keyed by
//! the hash of the source image URL.

use super::CachedImage;
use super::connection::CacheDb;
use super::hash::compute_cache_key;
use crate::Error;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
fn timestamp(at: chrono::DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl CacheDb {
    /// Get a cached image by source URL.
    ///
    /// Returns None if the URL isn't cached or its entry has expired.
    pub async fn get_image(&self, url: &str) -> Result<Option<CachedImage>, Error> {
        let key_hash = compute_cache_key(url);
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<Option<CachedImage>, Error> {
                let mut stmt =
                    conn.prepare("SELECT payload, extension FROM images WHERE key_hash = ?1 AND expires_at > ?2")?;

                let result = stmt.query_row(params![key_hash, now], |row| {
                    let payload: Vec<u8> = row.get(0)?;
                    Ok(CachedImage { payload: Bytes::from(payload), extension: row.get(1)? })
                });

                match result {
                    Ok(image) => Ok(Some(image)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace the image stored for a source URL.
    ///
    /// The entry expires after the policy TTL. When the table grows past the
    /// policy threshold the oldest entries are evicted.
    pub async fn put_image(&self, url: &str, image: &CachedImage) -> Result<(), Error> {
        let key_hash = compute_cache_key(url);
        let url = url.to_string();
        let payload = image.payload.to_vec();
        let extension = image.extension.clone();
        let size = payload.len() as i64;

        let fetched_at = Utc::now();
        let expires_at = fetched_at
            .checked_add_signed(self.policy.ttl)
            .ok_or_else(|| Error::InvalidInput(format!("cache ttl out of range: {}", self.policy.ttl)))?;
        let expires_at = timestamp(expires_at);
        let fetched_at = timestamp(fetched_at);

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO images (key_hash, url, payload, extension, size_bytes, fetched_at, expires_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ON CONFLICT(key_hash) DO UPDATE SET
                        url = excluded.url,
                        payload = excluded.payload,
                        extension = excluded.extension,
                        size_bytes = excluded.size_bytes,
                        fetched_at = excluded.fetched_at,
                        expires_at = excluded.expires_at",
                    params![key_hash, url, payload, extension, size, fetched_at, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        let evicted = self.purge_lru_images(self.policy.max_entries).await?;
        if evicted > 0 {
            tracing::debug!(evicted, "evicted oldest cached images");
        }

        Ok(())
    }

    /// Number of stored entries, expired ones included.
    pub async fn count_images(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete expired images.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired_images(&self) -> Result<u64, Error> {
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM images WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Purge oldest entries until count <= max_entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_lru_images(&self, max_entries: usize) -> Result<u64, Error> {
        let max = i64::try_from(max_entries).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
                if count <= max {
                    return Ok(0);
                }

                let deleted = conn.execute(
                    "DELETE FROM images WHERE key_hash IN (
                    SELECT key_hash FROM images ORDER BY fetched_at ASC, rowid ASC LIMIT ?1
                )",
                    params![count - max],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}

//! Image cache for downloaded memes.
//!
//! The fetch pipeline only talks to the [`ContentCache`] trait; [`CacheDb`]
//! is the persistent SQLite implementation and [`NullCache`] the always-miss
//! stand-in. It supports:
//!
//! - Keys derived from the image URL using SHA-256 hashing
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Time-based expiry and oldest-first eviction above an entry threshold

pub mod connection;
pub mod hash;
pub mod images;
pub mod migrations;

use async_trait::async_trait;
use bytes::Bytes;

pub use crate::Error;

pub use connection::{CacheDb, CachePolicy};

/// Downloaded image bytes plus the extension resolved for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedImage {
    pub payload: Bytes,
    /// File extension including the leading dot, e.g. `.png`.
    pub extension: String,
}

impl CachedImage {
    pub fn new(payload: impl Into<Bytes>, extension: impl Into<String>) -> Self {
        Self { payload: payload.into(), extension: extension.into() }
    }
}

/// Key-value cache consumed by the meme fetcher.
///
/// Implementations must tolerate concurrent readers and writers. A failed
/// lookup is a miss and a failed store is dropped: the cache can only make a
/// fetch faster, never change its result.
#[async_trait]
pub trait ContentCache: Send + Sync {
    /// Look up the image stored under `key` (the source image URL).
    async fn get(&self, key: &str) -> Option<CachedImage>;

    /// Store an image under `key`, replacing any previous entry.
    async fn set(&self, key: &str, image: CachedImage);
}

/// Cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

#[async_trait]
impl ContentCache for NullCache {
    async fn get(&self, _key: &str) -> Option<CachedImage> {
        None
    }

    async fn set(&self, _key: &str, _image: CachedImage) {}
}

#[async_trait]
impl ContentCache for CacheDb {
    async fn get(&self, key: &str) -> Option<CachedImage> {
        match self.get_image(key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, url = key, "image cache lookup failed");
                None
            }
        }
    }

    async fn set(&self, key: &str, image: CachedImage) {
        if let Err(e) = self.put_image(key, &image).await {
            tracing::warn!(error = %e, url = key, "image cache store failed");
        }
    }
}

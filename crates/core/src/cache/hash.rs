//! Cache key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key for an image URL.
pub fn compute_cache_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.trim().as_bytes());
    hex::encode(hasher.finalize())
}

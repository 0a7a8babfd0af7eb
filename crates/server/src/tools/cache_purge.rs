//! cache_purge tool implementation.
//!
//! Purges cached images by expiry or count.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use memebot_core::{CacheDb, Error};

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Delete entries past their expiry (default: true).
    #[serde(default = "default_true")]
    pub expired: bool,

    /// Keep only the newest N entries.
    #[serde(default)]
    pub max_entries: Option<usize>,
}

fn default_true() -> bool {
    true
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: u64,
    /// Number of entries left.
    pub remaining: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(cache: Option<&CacheDb>, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let cache = cache.ok_or_else(|| Error::InvalidInput("image cache is disabled".to_string()))?;

    if !params.expired && params.max_entries.is_none() {
        return Err(Error::InvalidInput("Either expired or max_entries must be specified".to_string()).into());
    }

    let mut deleted = 0u64;

    if params.expired {
        deleted += cache.purge_expired_images().await?;
    }

    if let Some(max_entries) = params.max_entries {
        deleted += cache.purge_lru_images(max_entries).await?;
    }

    let remaining = cache.count_images().await?;
    tracing::info!(deleted, remaining, "image cache purged");

    let output = CachePurgeOutput { deleted, remaining };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize purge result: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

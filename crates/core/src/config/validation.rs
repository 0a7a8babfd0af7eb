//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

const MAX_CACHE_TTL_DAYS: i64 = 36_500;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_meme_size` is 0
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `cache_ttl_days` or `cache_max_entries` is below 1
    /// - `cache_ttl_days` exceeds 100 years (36500 days)
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_meme_size == 0 {
            return Err(ConfigError::Invalid {
                field: "max_meme_size".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.cache_ttl_days < 1 {
            return Err(ConfigError::Invalid { field: "cache_ttl_days".into(), reason: "must be at least 1".into() });
        }
        if self.cache_ttl_days > MAX_CACHE_TTL_DAYS {
            return Err(ConfigError::Invalid {
                field: "cache_ttl_days".into(),
                reason: format!("must not exceed {MAX_CACHE_TTL_DAYS} days"),
            });
        }
        if self.cache_max_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_max_entries".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if !self.cache_enabled {
            tracing::debug!("image cache disabled; every meme is downloaded");
        }

        Ok(())
    }
}

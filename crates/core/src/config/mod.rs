//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MEMEBOT_*)
//! 2. TOML config file (if MEMEBOT_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::CachePolicy;

mod validation;

pub use validation::ConfigError;

/// Default user agent, the desktop Firefox string the meme sites serve full pages to.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:60.0) Gecko/20100101 Firefox/60.0";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MEMEBOT_*)
/// 2. TOML config file (if MEMEBOT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Maximum meme size in bytes.
    ///
    /// Set via MEMEBOT_MAX_MEME_SIZE environment variable.
    #[serde(default = "default_max_meme_size")]
    pub max_meme_size: usize,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via MEMEBOT_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via MEMEBOT_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Whether downloaded images of cacheable sources are persisted.
    ///
    /// Set via MEMEBOT_CACHE_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Directory holding the SQLite image cache.
    ///
    /// Set via MEMEBOT_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Days a cached image is kept.
    ///
    /// Set via MEMEBOT_CACHE_TTL_DAYS environment variable.
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: i64,

    /// Entry count above which the oldest cached images are evicted.
    ///
    /// Set via MEMEBOT_CACHE_MAX_ENTRIES environment variable.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Append the image URL to the reply caption.
    ///
    /// Set via MEMEBOT_INCLUDE_SOURCE_URL environment variable.
    #[serde(default)]
    pub include_source_url: bool,
}

fn default_max_meme_size() -> usize {
    5_242_880 // 5MB
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./memebot-cache")
}

fn default_cache_ttl_days() -> i64 {
    30
}

fn default_cache_max_entries() -> usize {
    2000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_meme_size: default_max_meme_size(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            cache_enabled: true,
            cache_dir: default_cache_dir(),
            cache_ttl_days: default_cache_ttl_days(),
            cache_max_entries: default_cache_max_entries(),
            include_source_url: false,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Path of the SQLite cache file inside `cache_dir`.
    pub fn cache_db_path(&self) -> PathBuf {
        self.cache_dir.join("images.sqlite")
    }

    /// Retention and eviction settings for the image cache.
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy { ttl: chrono::Duration::days(self.cache_ttl_days), max_entries: self.cache_max_entries }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MEMEBOT_`
    /// 2. TOML file from `MEMEBOT_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MEMEBOT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MEMEBOT_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.max_meme_size, 5_242_880);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.timeout_ms, 15_000);
        assert!(config.cache_enabled);
        assert_eq!(config.cache_dir, PathBuf::from("./memebot-cache"));
        assert_eq!(config.cache_ttl_days, 30);
        assert_eq!(config.cache_max_entries, 2000);
        assert!(!config.include_source_url);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_cache_policy() {
        let config = AppConfig { cache_ttl_days: 7, cache_max_entries: 10, ..Default::default() };
        let policy = config.cache_policy();
        assert_eq!(policy.ttl, chrono::Duration::days(7));
        assert_eq!(policy.max_entries, 10);
    }

    #[test]
    fn test_cache_db_path() {
        let config = AppConfig { cache_dir: PathBuf::from("/tmp/memes"), ..Default::default() };
        assert_eq!(config.cache_db_path(), PathBuf::from("/tmp/memes/images.sqlite"));
    }

    #[test]
    fn test_load_from_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("memebot.toml", "max_meme_size = 1024\ninclude_source_url = true\n")?;
            jail.set_env("MEMEBOT_CONFIG_FILE", "memebot.toml");
            jail.set_env("MEMEBOT_TIMEOUT_MS", "5000");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.max_meme_size, 1024);
            assert!(config.include_source_url);
            assert_eq!(config.timeout_ms, 5000);
            Ok(())
        });
    }
}

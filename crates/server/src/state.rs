//! Shared server state: configuration, site rules, and the meme fetcher.

use std::sync::Arc;

use memebot_client::{FetchClient, FetchConfig, HttpFetch, MemeFetcher, SiteRule};
use memebot_core::{AppConfig, CacheDb, ContentCache, Error, NullCache};

/// Everything a tool call needs, built once at startup.
pub struct ServerState {
    pub config: AppConfig,
    pub rules: Vec<SiteRule>,
    pub fetcher: MemeFetcher,
    /// Present when the image cache is enabled.
    pub cache: Option<CacheDb>,
}

impl ServerState {
    pub fn new(config: AppConfig, rules: Vec<SiteRule>, http: Arc<dyn HttpFetch>, cache: Option<CacheDb>) -> Self {
        let content_cache: Arc<dyn ContentCache> = match &cache {
            Some(db) => Arc::new(db.clone()),
            None => Arc::new(NullCache),
        };
        let fetcher = MemeFetcher::new(http, content_cache);
        Self { config, rules, fetcher, cache }
    }

    /// Build the production state: reqwest client, built-in sources, and the
    /// on-disk cache when enabled.
    ///
    /// Expired entries and entries above the threshold are purged on open.
    pub async fn from_config(config: AppConfig) -> Result<Self, Error> {
        let http = Arc::new(FetchClient::new(FetchConfig::from(&config))?);

        let cache = if config.cache_enabled {
            let db = CacheDb::open(config.cache_db_path(), config.cache_policy()).await?;
            let expired = db.purge_expired_images().await?;
            let evicted = db.purge_lru_images(config.cache_max_entries).await?;
            tracing::info!(
                path = %config.cache_db_path().display(),
                expired,
                evicted,
                "image cache ready"
            );
            Some(db)
        } else {
            None
        };

        Ok(Self::new(config, SiteRule::builtin()?, http, cache))
    }

    /// Find the rule for a source name.
    pub fn rule(&self, source: &str) -> Result<&SiteRule, Error> {
        self.rules.iter().find(|r| r.name == source).ok_or_else(|| {
            let known: Vec<_> = self.rules.iter().map(|r| r.name).collect();
            Error::InvalidInput(format!("unknown source: {} (expected one of {})", source, known.join(", ")))
        })
    }
}

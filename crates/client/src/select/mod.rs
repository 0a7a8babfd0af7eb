//! Bounded meme selection.
//!
//! [`MemeFetcher::fetch_meme`] scrapes and downloads up to [`MAX_ATTEMPTS`]
//! candidates. The first payload within the size limit wins immediately;
//! otherwise the smallest oversized payload seen is returned. Errors of a
//! single attempt only consume that attempt: the loop fails only when no
//! attempt produced a payload at all.

use bytes::Bytes;
use memebot_core::{CachedImage, ContentCache, Error};
use std::sync::Arc;
use url::Url;

use crate::fetch::HttpFetch;
use crate::scrape::{Candidate, Scraper, SiteRule, SourceKind};

/// Scrape+download attempts per invocation.
pub const MAX_ATTEMPTS: usize = 10;

/// Extension used when the response metadata identifies none.
pub const DEFAULT_EXTENSION: &str = ".jpg";

const FILENAME_STEM: &str = "meme";

/// A downloaded meme ready to be sent as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemeResult {
    pub caption: String,
    /// Resolved extension, including the dot.
    pub extension: String,
    pub payload: Bytes,
    pub image_url: Url,
}

impl MemeResult {
    fn new(candidate: Candidate, image: CachedImage) -> Self {
        Self {
            caption: candidate.caption,
            extension: image.extension,
            payload: image.payload,
            image_url: candidate.image_url,
        }
    }

    /// Attachment filename: `meme` plus the extension.
    pub fn filename(&self) -> String {
        format!("{}{}", FILENAME_STEM, self.extension)
    }

    /// Reply text: the caption, optionally followed by the image URL.
    pub fn reply_text(&self, include_source_url: bool) -> String {
        if include_source_url {
            format!("{}\n\n{}", self.caption, self.image_url)
        } else {
            self.caption.clone()
        }
    }
}

/// Progress of one `fetch_meme` invocation.
#[derive(Debug)]
enum SelectState {
    Searching { attempts: usize, best: Option<MemeResult>, last_error: Option<Error> },
    Succeeded(MemeResult),
    ExhaustedWithFallback(MemeResult),
    ExhaustedWithoutCandidate(Error),
}

impl SelectState {
    fn start() -> Self {
        SelectState::Searching { attempts: 0, best: None, last_error: None }
    }

    /// Fold the outcome of one attempt into the state.
    fn advance(self, outcome: Result<MemeResult, Error>, max_size: usize) -> Self {
        let (attempts, mut best, mut last_error) = match self {
            SelectState::Searching { attempts, best, last_error } => (attempts, best, last_error),
            terminal => return terminal,
        };

        match outcome {
            Ok(meme) if meme.payload.len() <= max_size => return SelectState::Succeeded(meme),
            Ok(meme) => {
                let smaller = best.as_ref().is_none_or(|b| meme.payload.len() < b.payload.len());
                if smaller {
                    best = Some(meme);
                }
            }
            Err(e) => last_error = Some(e),
        }

        let attempts = attempts + 1;
        if attempts < MAX_ATTEMPTS {
            return SelectState::Searching { attempts, best, last_error };
        }

        match best {
            Some(meme) => SelectState::ExhaustedWithFallback(meme),
            None => SelectState::ExhaustedWithoutCandidate(exhaustion_error(last_error)),
        }
    }
}

/// Error reported once every attempt failed.
fn exhaustion_error(last: Option<Error>) -> Error {
    match last {
        Some(e @ (Error::SourceUnavailable(_) | Error::EmptyResult(_))) => e,
        Some(other) => Error::SourceUnavailable(other.to_string()),
        None => Error::EmptyResult("no attempt produced a meme".into()),
    }
}

/// Fetches memes from site rules with a bounded number of attempts.
#[derive(Clone)]
pub struct MemeFetcher {
    http: Arc<dyn HttpFetch>,
    cache: Arc<dyn ContentCache>,
    scraper: Scraper,
}

impl MemeFetcher {
    pub fn new(http: Arc<dyn HttpFetch>, cache: Arc<dyn ContentCache>) -> Self {
        let scraper = Scraper::new(Arc::clone(&http));
        Self { http, cache, scraper }
    }

    /// Fetch one meme from `rule`, preferring payloads of at most `max_size` bytes.
    ///
    /// `category` selects the listing category and is ignored by random-item
    /// sources. If every attempt is oversized the smallest payload is
    /// returned anyway.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a missing or unknown listing category
    /// - `SourceUnavailable` / `EmptyResult` when no attempt produced a payload
    pub async fn fetch_meme(
        &self, rule: &SiteRule, category: Option<&str>, max_size: usize,
    ) -> Result<MemeResult, Error> {
        if let SourceKind::Listing { .. } = rule.kind {
            let name = category.ok_or_else(|| Error::InvalidInput(format!("{} requires a category", rule.name)))?;
            rule.category(name)?;
        }

        let mut state = SelectState::start();
        loop {
            state = match state {
                SelectState::Searching { attempts, .. } => {
                    let outcome = self.attempt(rule, category).await;
                    match &outcome {
                        Ok(meme) => tracing::debug!(
                            source = rule.name,
                            attempt = attempts + 1,
                            size = meme.payload.len(),
                            max_size,
                            url = %meme.image_url,
                            "downloaded candidate"
                        ),
                        Err(e) => tracing::warn!(
                            source = rule.name,
                            attempt = attempts + 1,
                            error = %e,
                            "meme attempt failed"
                        ),
                    }
                    state.advance(outcome, max_size)
                }
                SelectState::Succeeded(meme) => return Ok(meme),
                SelectState::ExhaustedWithFallback(meme) => {
                    tracing::info!(
                        source = rule.name,
                        size = meme.payload.len(),
                        max_size,
                        "no candidate within the size limit, returning the smallest"
                    );
                    return Ok(meme);
                }
                SelectState::ExhaustedWithoutCandidate(e) => return Err(e),
            };
        }
    }

    async fn attempt(&self, rule: &SiteRule, category: Option<&str>) -> Result<MemeResult, Error> {
        let candidate = self.scraper.scrape_one(rule, category).await?;
        let image = self.image(rule, &candidate.image_url).await?;
        Ok(MemeResult::new(candidate, image))
    }

    /// Cached image for cacheable sources, otherwise a fresh download.
    async fn image(&self, rule: &SiteRule, url: &Url) -> Result<CachedImage, Error> {
        if rule.cacheable
            && let Some(hit) = self.cache.get(url.as_str()).await
        {
            tracing::debug!("cache hit for {}", url);
            return Ok(hit);
        }

        let response = self
            .http
            .fetch(url)
            .await
            .map_err(|e| Error::SourceUnavailable(format!("image {}: {}", url, e)))?;
        let extension = response.extension().unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        let image = CachedImage { payload: response.bytes, extension };

        if rule.cacheable {
            self.cache.set(url.as_str(), image.clone()).await;
        }

        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchResponse;
    use async_trait::async_trait;
    use memebot_core::{CacheDb, NullCache};
    use reqwest::{StatusCode, header};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Site whose n-th page request links image `n`, sized from `sizes` (cycled).
    #[derive(Default)]
    struct ScriptedSite {
        sizes: Vec<usize>,
        failing_pages: Vec<usize>,
        same_image: bool,
        pages: AtomicUsize,
        images: AtomicUsize,
    }

    impl ScriptedSite {
        fn with_sizes(sizes: &[usize]) -> Self {
            Self { sizes: sizes.to_vec(), ..Default::default() }
        }

        fn pages(&self) -> usize {
            self.pages.load(Ordering::SeqCst)
        }

        fn images(&self) -> usize {
            self.images.load(Ordering::SeqCst)
        }
    }

    fn response(url: &Url, body: Vec<u8>, content_type: &str) -> FetchResponse {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, content_type.parse().unwrap());
        FetchResponse {
            url: url.clone(),
            final_url: url.clone(),
            status: StatusCode::OK,
            content_type: Some(content_type.to_string()),
            bytes: Bytes::from(body),
            headers,
            fetch_ms: 0,
        }
    }

    #[async_trait]
    impl HttpFetch for ScriptedSite {
        async fn fetch(&self, url: &Url) -> Result<FetchResponse, Error> {
            if url.host_str() == Some("img.test") {
                self.images.fetch_add(1, Ordering::SeqCst);
                let n: usize = url.path().trim_start_matches('/').parse().unwrap();
                let size = self.sizes[n % self.sizes.len()];
                return Ok(response(url, vec![0u8; size], "image/png"));
            }

            let n = self.pages.fetch_add(1, Ordering::SeqCst);
            if self.failing_pages.contains(&n) {
                return Err(Error::HttpError("status 503".into()));
            }
            let image = if self.same_image { 0 } else { n };
            let html = format!(
                r#"<div class="storyContent neperianadas"><img src="https://img.test/{image}" title="meme {image}" alt="meme {image}"></div>"#
            );
            Ok(response(url, html.into_bytes(), "text/html"))
        }
    }

    fn random_rule() -> SiteRule {
        SiteRule::random_item("cuantocabron", "https://m.cuantocabron.com", "/aleatorio").unwrap()
    }

    fn listing_rule() -> SiteRule {
        SiteRule::planetaneperiano("https://www.planetaneperiano.com").unwrap()
    }

    fn fetcher(site: &Arc<ScriptedSite>) -> MemeFetcher {
        MemeFetcher::new(site.clone(), Arc::new(NullCache))
    }

    #[tokio::test]
    async fn test_first_payload_within_limit_wins() {
        let site = Arc::new(ScriptedSite::with_sizes(&[5000, 1500, 800, 4000]));
        let meme = fetcher(&site).fetch_meme(&random_rule(), None, 1000).await.unwrap();

        assert_eq!(meme.payload.len(), 800);
        assert_eq!(meme.caption, "meme 2");
        assert_eq!(meme.filename(), "meme.png");
        assert_eq!(site.pages(), 3);
        assert_eq!(site.images(), 3);
    }

    #[tokio::test]
    async fn test_success_is_first_fit_not_smallest() {
        let site = Arc::new(ScriptedSite::with_sizes(&[5000, 900, 10]));
        let meme = fetcher(&site).fetch_meme(&random_rule(), None, 1000).await.unwrap();

        assert_eq!(meme.payload.len(), 900);
        assert_eq!(site.pages(), 2);
    }

    #[tokio::test]
    async fn test_all_oversized_returns_smallest_after_budget() {
        let site = Arc::new(ScriptedSite::with_sizes(&[5000, 3000, 4000]));
        let meme = fetcher(&site).fetch_meme(&random_rule(), None, 1000).await.unwrap();

        assert_eq!(meme.payload.len(), 3000);
        assert_eq!(site.pages(), MAX_ATTEMPTS);
        assert_eq!(site.images(), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_equal_oversized_keeps_earliest() {
        let site = Arc::new(ScriptedSite::with_sizes(&[3000]));
        let meme = fetcher(&site).fetch_meme(&random_rule(), None, 1000).await.unwrap();

        assert_eq!(meme.caption, "meme 0");
    }

    #[tokio::test]
    async fn test_failed_attempts_do_not_abort() {
        let site = Arc::new(ScriptedSite {
            sizes: vec![5000, 5000, 5000, 10],
            failing_pages: vec![0, 1, 2],
            ..Default::default()
        });
        let meme = fetcher(&site).fetch_meme(&random_rule(), None, 1000).await.unwrap();

        assert_eq!(meme.payload.len(), 10);
        assert_eq!(site.pages(), 4);
        assert_eq!(site.images(), 1);
    }

    #[tokio::test]
    async fn test_failures_fall_back_to_oversized_candidate() {
        let site = Arc::new(ScriptedSite {
            sizes: vec![7000, 2000],
            failing_pages: (2..MAX_ATTEMPTS).collect(),
            ..Default::default()
        });
        let meme = fetcher(&site).fetch_meme(&random_rule(), None, 1000).await.unwrap();

        assert_eq!(meme.payload.len(), 2000);
        assert_eq!(site.pages(), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_every_attempt_failing_is_source_unavailable() {
        let site = Arc::new(ScriptedSite {
            sizes: vec![1],
            failing_pages: (0..MAX_ATTEMPTS).collect(),
            ..Default::default()
        });
        let err = fetcher(&site).fetch_meme(&random_rule(), None, 1000).await.unwrap_err();

        assert!(matches!(err, Error::SourceUnavailable(_)));
        assert_eq!(site.pages(), MAX_ATTEMPTS);
        assert_eq!(site.images(), 0);
    }

    #[tokio::test]
    async fn test_listing_requires_valid_category_before_fetching() {
        let site = Arc::new(ScriptedSite::with_sizes(&[1]));
        let err = fetcher(&site).fetch_meme(&listing_rule(), Some("anime"), 1000).await.unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(site.pages(), 0);
    }

    #[tokio::test]
    async fn test_listing_uses_cache_for_repeated_image() {
        let site = Arc::new(ScriptedSite { sizes: vec![64], same_image: true, ..Default::default() });
        let cache = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let fetcher = MemeFetcher::new(site.clone(), cache.clone());

        let first = fetcher.fetch_meme(&listing_rule(), Some("otaku"), 1000).await.unwrap();
        let second = fetcher.fetch_meme(&listing_rule(), Some("otaku"), 1000).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(site.pages(), 2);
        assert_eq!(site.images(), 1);
        let cached = cache.get_image("https://img.test/0").await.unwrap().unwrap();
        assert_eq!(cached.extension, ".png");
        assert_eq!(cached.payload.len(), 64);
    }

    #[tokio::test]
    async fn test_null_cache_only_costs_downloads() {
        let site = Arc::new(ScriptedSite { sizes: vec![64], same_image: true, ..Default::default() });
        let fetcher = fetcher(&site);

        let first = fetcher.fetch_meme(&listing_rule(), Some("general"), 1000).await.unwrap();
        let second = fetcher.fetch_meme(&listing_rule(), Some("general"), 1000).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(site.images(), 2);
    }

    #[tokio::test]
    async fn test_random_item_sources_skip_cache() {
        let site = Arc::new(ScriptedSite { sizes: vec![64], same_image: true, ..Default::default() });
        let cache = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let fetcher = MemeFetcher::new(site.clone(), cache.clone());

        fetcher.fetch_meme(&random_rule(), None, 1000).await.unwrap();

        assert_eq!(cache.count_images().await.unwrap(), 0);
    }

    #[test]
    fn test_reply_text() {
        let meme = MemeResult::new(
            Candidate { caption: "Hola".into(), image_url: Url::parse("https://img.test/1").unwrap() },
            CachedImage::new(vec![1], ".gif"),
        );
        assert_eq!(meme.extension, ".gif");
        assert_eq!(meme.filename(), "meme.gif");
        assert_eq!(meme.reply_text(false), "Hola");
        assert_eq!(meme.reply_text(true), "Hola\n\nhttps://img.test/1");
    }

    #[test]
    fn test_state_stays_terminal() {
        let meme = MemeResult::new(
            Candidate { caption: String::new(), image_url: Url::parse("https://img.test/1").unwrap() },
            CachedImage::new(vec![1, 2, 3], DEFAULT_EXTENSION),
        );
        let state = SelectState::start().advance(Ok(meme.clone()), 3);
        assert!(matches!(state, SelectState::Succeeded(_)));

        let state = state.advance(Err(Error::EmptyResult("late".into())), 3);
        assert!(matches!(state, SelectState::Succeeded(ref m) if *m == meme));
    }

    #[test]
    fn test_exhaustion_without_payload_reports_last_error() {
        let mut state = SelectState::start();
        for _ in 0..MAX_ATTEMPTS - 1 {
            state = state.advance(Err(Error::HttpError("status 500".into())), 10);
        }
        state = state.advance(Err(Error::EmptyResult("nothing on page".into())), 10);

        assert!(matches!(state, SelectState::ExhaustedWithoutCandidate(Error::EmptyResult(_))));
    }
}

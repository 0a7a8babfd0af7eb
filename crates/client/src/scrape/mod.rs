//! Meme candidate scraping.
//!
//! Pages are fetched through [`HttpFetch`] and parsed with `scraper`. A
//! random-item page yields the image of its last container; a listing page
//! yields every container that holds an image.
//!
//! ### Failures
//! - `SOURCE_UNAVAILABLE`: the page could not be fetched, or lacks the
//!   expected containers
//! - `EMPTY_RESULT`: the page parsed but no container held a usable image

pub mod rules;

pub use rules::{Category, SiteRule, SourceKind};

use memebot_core::Error;
use rand::Rng;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use url::Url;

use crate::fetch::HttpFetch;

/// A meme found on a page, not yet downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub caption: String,
    pub image_url: Url,
}

/// Candidates produced by one page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scraped {
    One(Candidate),
    /// Never empty.
    Many(Vec<Candidate>),
}

/// Fetches source pages and extracts candidates according to a [`SiteRule`].
#[derive(Clone)]
pub struct Scraper {
    http: Arc<dyn HttpFetch>,
}

impl Scraper {
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self { http }
    }

    /// Request one page of `rule` and extract its candidates.
    ///
    /// Listing sources pick a page uniformly within the category's range, so
    /// `category` is required for them.
    pub async fn scrape(&self, rule: &SiteRule, category: Option<&str>) -> Result<Scraped, Error> {
        let page = match &rule.kind {
            SourceKind::RandomItem => 1,
            SourceKind::Listing { .. } => {
                let name = category.ok_or_else(|| Error::InvalidInput(format!("{} requires a category", rule.name)))?;
                let max_page = rule.category(name)?.max_page.max(1);
                rand::thread_rng().gen_range(1..=max_page)
            }
        };
        let url = rule.page_url(category, page)?;

        let response = self
            .http
            .fetch(&url)
            .await
            .map_err(|e| Error::SourceUnavailable(format!("{}: {}", url, e)))?;
        let html = response.text();

        match rule.kind {
            SourceKind::RandomItem => parse_random_item(&html, rule).map(Scraped::One),
            SourceKind::Listing { .. } => parse_listing(&html, rule).map(Scraped::Many),
        }
    }

    /// Request a page and reduce it to a single candidate, chosen uniformly
    /// when the page holds several.
    pub async fn scrape_one(&self, rule: &SiteRule, category: Option<&str>) -> Result<Candidate, Error> {
        match self.scrape(rule, category).await? {
            Scraped::One(candidate) => Ok(candidate),
            Scraped::Many(mut candidates) => {
                let index = rand::thread_rng().gen_range(0..candidates.len());
                Ok(candidates.swap_remove(index))
            }
        }
    }
}

fn selector(css: &str) -> Result<Selector, Error> {
    Selector::parse(css).map_err(|e| Error::InvalidInput(format!("invalid selector {}: {:?}", css, e)))
}

/// Build a candidate from the first `<img>` inside `container`.
fn candidate_in(container: ElementRef<'_>, img: &Selector, rule: &SiteRule) -> Option<Candidate> {
    let element = container.select(img).next()?;
    let src = element.value().attr("src")?;

    let image_url = match rule.resolve_image_url(src) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!(source = rule.name, error = %e, "skipping image with unusable src");
            return None;
        }
    };
    let caption = element.value().attr(rule.caption_attr).unwrap_or_default().trim().to_string();

    Some(Candidate { caption, image_url })
}

/// Extract the image of the last container on a random-item page.
pub fn parse_random_item(html: &str, rule: &SiteRule) -> Result<Candidate, Error> {
    let document = Html::parse_document(html);
    let containers = selector(rule.container_selector)?;
    let img = selector("img")?;

    let container = document.select(&containers).last().ok_or_else(|| {
        Error::SourceUnavailable(format!("{}: page has no {}", rule.name, rule.container_selector))
    })?;

    candidate_in(container, &img, rule)
        .ok_or_else(|| Error::EmptyResult(format!("{}: no image in the random item", rule.name)))
}

/// Extract every container holding an image on a listing page.
pub fn parse_listing(html: &str, rule: &SiteRule) -> Result<Vec<Candidate>, Error> {
    let document = Html::parse_document(html);
    let containers = selector(rule.container_selector)?;
    let img = selector("img")?;

    let candidates: Vec<Candidate> = document
        .select(&containers)
        .filter_map(|container| candidate_in(container, &img, rule))
        .collect();

    if candidates.is_empty() {
        return Err(Error::EmptyResult(format!("{}: no images on listing page", rule.name)));
    }

    Ok(candidates)
}

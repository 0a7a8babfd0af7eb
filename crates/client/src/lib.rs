//! Client code for memebot.
//!
//! This crate provides the HTTP fetch pipeline, extension inference, site
//! scraping, and the bounded meme selector used by the server.

pub mod fetch;
pub mod scrape;
pub mod select;

pub use fetch::{FetchClient, FetchConfig, FetchResponse, HttpFetch, resolve_extension};
pub use scrape::{Candidate, Category, Scraped, Scraper, SiteRule, SourceKind};
pub use select::{DEFAULT_EXTENSION, MAX_ATTEMPTS, MemeFetcher, MemeResult};

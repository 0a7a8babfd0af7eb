//! Core types and shared functionality for memebot.
//!
//! This crate provides:
//! - Image cache with a SQLite backend and the `ContentCache` seam
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CachePolicy, CachedImage, ContentCache, NullCache};
pub use config::AppConfig;
pub use error::Error;

//! MCP tool implementations.
//!
//! This module contains all tools exposed by the memebot server.

pub mod cache_purge;
pub mod meme;

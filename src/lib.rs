//! Reelname - metadata aggregation for media renaming
//!
//! Scans a media tree, turns classified nodes into deduplicated lookup
//! items and resolves them against TMDB, OMDb and ffprobe in three ordered
//! phases (titles, seasons, episodes). The result is a map from lookup key
//! to merged metadata that a renaming front end can act on.

pub mod config;
pub mod engine;
pub mod metadata;
pub mod scanner;

pub use engine::{Engine, EngineOptions};
pub use reelname_common::{Error, MediaKind, Phase, ProviderError, ProviderKind, Result};

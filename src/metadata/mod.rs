//! Metadata providers and the rules for combining their answers.
//!
//! # Module layout
//!
//! - [`record`] -- The merged [`MediaMetadata`] record.
//! - [`provider`] -- The [`MetadataProvider`] trait and [`LookupRequest`].
//! - [`providers`] -- TMDB (primary), OMDb (secondary) and ffprobe (probe).
//! - [`registry`] -- The active provider set.
//! - [`retry`] -- Rate-limit backoff around a single call.
//! - [`merge`] -- Source precedence when combining results.

pub mod merge;
pub mod provider;
pub mod providers;
pub mod record;
pub mod registry;
pub mod retry;

pub use merge::{merge, overlay};
pub use provider::{Capabilities, LookupRequest, MetadataProvider};
pub use record::MediaMetadata;
pub use registry::ProviderRegistry;
pub use retry::{fetch_with_backoff, BackoffPolicy};

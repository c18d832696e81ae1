//! Concrete metadata provider implementations.
//!
//! Each submodule wraps a single external source and implements the
//! [`MetadataProvider`](super::MetadataProvider) trait.

pub mod ffprobe;
pub mod omdb;
pub mod tmdb;

pub use ffprobe::FfprobeProvider;
pub use omdb::OmdbProvider;
pub use tmdb::TmdbProvider;

//! Reelname-Common: shared types, errors, and utilities.
//!
//! This crate provides the vocabulary used across reelname:
//!
//! - **Core Types**: media kinds, lookup phases, and the closed provider set
//! - **Errors**: the crate-wide [`Error`] and the provider-level
//!   [`ProviderError`] taxonomy
//! - **Path Utilities**: functions to detect file types by extension
//!
//! # Examples
//!
//! ```
//! use reelname_common::{MediaKind, Phase, ProviderError};
//! use reelname_common::paths::is_video_file;
//! use std::path::Path;
//!
//! assert_eq!(MediaKind::Episode.phase(), Some(Phase::Episodes));
//! assert!(ProviderError::not_found("no match").is_not_found());
//! assert!(is_video_file(Path::new("movie.mkv")));
//! ```

pub mod error;
pub mod paths;
pub mod types;

pub use error::{Error, ProviderError, Result};
pub use types::*;

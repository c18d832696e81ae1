//! Error types used throughout reelname.
//!
//! [`Error`] is the crate-wide failure type returned by engine and
//! configuration APIs. [`ProviderError`] is the narrower taxonomy every
//! metadata provider reports, and drives the engine's retry and
//! failure-tracking decisions.

use std::fmt;
use std::time::Duration;

use crate::types::ProviderKind;

/// Failure reported by a single metadata provider call.
///
/// The variants fall into three groups:
///
/// - transient: [`RateLimited`](Self::RateLimited), retried internally with
///   backoff until [`Exhausted`](Self::Exhausted)
/// - user-correctable: [`NotFound`](Self::NotFound), tracked for manual retry
/// - terminal: everything else
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// The provider asked us to slow down.
    #[error("rate limited")]
    RateLimited {
        /// Server-suggested wait, if the provider sent one.
        retry_after: Option<Duration>,
    },

    /// No match for the query.
    #[error("not found: {0}")]
    NotFound(String),

    /// Credentials were rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The request was malformed or the provider answered with an
    /// unexpected status.
    #[error("request failed: {0}")]
    Request(String),

    /// Transport-level failure (DNS, connect, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The response could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// An external tool (ffprobe) failed.
    #[error("tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Rate limiting persisted through every backoff escalation.
    #[error("rate limit persisted after {attempts} attempts")]
    Exhausted {
        /// Number of calls made before giving up.
        attempts: u32,
    },

    /// The lookup was cancelled.
    #[error("cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Convenience constructor for [`ProviderError::NotFound`].
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Convenience constructor for [`ProviderError::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// `true` for the "no match" outcome that is tracked for manual retry.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// `true` when the provider is throttling us.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// `true` for errors that end up in the engine's terminal error list.
    pub fn is_terminal(&self) -> bool {
        !self.is_not_found() && !self.is_rate_limited()
    }
}

/// Common error type for reelname.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "lookup key").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A provider was asked for but is not registered or has no credentials.
    #[error("provider not configured: {0}")]
    ProviderNotConfigured(ProviderKind),

    /// A provider call failed with a terminal error.
    #[error("provider {provider} failed: {source}")]
    Provider {
        /// Which provider failed.
        provider: ProviderKind,
        /// The provider's error.
        #[source]
        source: ProviderError,
    },

    /// Configuration is invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Provider`].
    pub fn provider(provider: ProviderKind, source: ProviderError) -> Self {
        Self::Provider { provider, source }
    }

    /// Convenience constructor for [`Error::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

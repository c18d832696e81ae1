//! Provider registry holding the active set of [`MetadataProvider`]s.
//!
//! Providers are kept in registration order. Only providers reporting
//! [`MetadataProvider::is_available`] take part in lookups; an adapter
//! without credentials is simply skipped.

use std::sync::Arc;

use reelname_common::{ProviderKind, Result};
use tracing::{debug, info};

use super::provider::MetadataProvider;
use super::providers::{FfprobeProvider, OmdbProvider, TmdbProvider};
use crate::config::{EngineConfig, ProvidersConfig};

/// A registry that manages multiple [`MetadataProvider`] implementations.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use reelname::metadata::ProviderRegistry;
///
/// let mut registry = ProviderRegistry::new();
/// registry.register(Arc::new(my_provider));
/// assert_eq!(registry.names(), vec!["tmdb"]);
/// ```
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MetadataProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry with no providers.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Build the built-in adapters from configuration.
    ///
    /// Every adapter is registered; whether it is active depends on the
    /// credentials (or binary) it was configured with.
    pub fn from_config(providers: &ProvidersConfig, engine: &EngineConfig) -> Result<Self> {
        let mut tmdb = TmdbProvider::new();
        tmdb.configure(&providers.tmdb.options(engine))?;
        let mut omdb = OmdbProvider::new();
        omdb.configure(&providers.omdb.options(engine))?;
        let mut ffprobe = FfprobeProvider::new();
        ffprobe.configure(&providers.ffprobe.options(engine))?;

        let mut registry = Self::new();
        registry.register(Arc::new(tmdb));
        registry.register(Arc::new(omdb));
        registry.register(Arc::new(ffprobe));

        info!(active = ?registry.names(), "Metadata providers configured");
        Ok(registry)
    }

    /// Register a new metadata provider.
    pub fn register(&mut self, provider: Arc<dyn MetadataProvider>) {
        debug!(
            provider = provider.name(),
            kind = %provider.kind(),
            available = provider.is_available(),
            "Registering metadata provider"
        );
        self.providers.push(provider);
    }

    /// All providers that are currently available, in registration order.
    pub fn available(&self) -> Vec<Arc<dyn MetadataProvider>> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .cloned()
            .collect()
    }

    /// The provider playing `kind`. An available one is preferred over an
    /// earlier registered one that is not.
    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn MetadataProvider>> {
        self.providers
            .iter()
            .find(|p| p.kind() == kind && p.is_available())
            .or_else(|| self.providers.iter().find(|p| p.kind() == kind))
            .cloned()
    }

    /// Names of the available providers.
    pub fn names(&self) -> Vec<&'static str> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.name())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

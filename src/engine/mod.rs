//! Phased, concurrent metadata lookup.
//!
//! The [`Engine`] takes the deduplicated [`LookupItem`]s from the scanner,
//! resolves them against the active providers in three strictly ordered
//! phases and keeps the results in a shared [`MetadataCache`]. Progress is
//! published on a bounded stream returned by [`Engine::start`].
//!
//! Provider "not found" outcomes are kept as [`FailureRecord`]s that can be
//! retried with a corrected query through [`Engine::retry`]. Every other
//! provider error ends up in the terminal list returned by
//! [`Engine::errors`].

pub mod cache;
pub mod failures;
pub mod lookup;
mod pool;
pub mod progress;
mod runner;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use reelname_common::{Error, ProviderError, ProviderKind, Result};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::metadata::{overlay, BackoffPolicy, MediaMetadata, MetadataProvider, ProviderRegistry};
use crate::scanner::{collect, Classifier, LookupItem, MediaTree};

pub use cache::MetadataCache;
pub use failures::{FailureKey, FailureRecord, FailureTracker};
pub use lookup::{LookupResult, ProviderFailure};
pub use progress::{ProgressEvent, ProgressSummary};

use progress::ProgressReporter;

/// A provider error that cannot be fixed by retrying with another query.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{provider_name} lookup for {key} failed: {source}")]
pub struct TerminalError {
    pub key: String,
    pub provider: ProviderKind,
    pub provider_name: String,
    #[source]
    pub source: ProviderError,
}

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Upper bound on concurrent lookups.
    pub worker_limit: usize,
    /// Capacity of the progress stream.
    pub event_buffer: usize,
    pub backoff: BackoffPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for EngineOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            worker_limit: config.worker_limit,
            event_buffer: config.event_buffer,
            backoff: BackoffPolicy::new(config.backoff_unit(), config.max_escalations),
        }
    }
}

pub(crate) struct EngineInner {
    registry: ProviderRegistry,
    /// Providers that were available when the engine was built.
    providers: Vec<Arc<dyn MetadataProvider>>,
    items: Vec<LookupItem>,
    index: HashMap<String, usize>,
    options: EngineOptions,
    cache: MetadataCache,
    failures: FailureTracker,
    errors: Mutex<Vec<TerminalError>>,
    progress: ProgressReporter,
    started: AtomicBool,
}

impl EngineInner {
    fn error_count(&self) -> usize {
        self.failures.len() + self.errors.lock().len()
    }

    fn refresh_error_count(&self) {
        let count = self.error_count();
        self.progress.update(|s| s.error_count = count);
    }
}

/// Metadata lookup engine for one scan.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn new(registry: ProviderRegistry, items: Vec<LookupItem>, options: EngineOptions) -> Self {
        Self::with_cache(registry, items, options, MetadataCache::new())
    }

    /// Build an engine on top of an existing cache. Keys already present
    /// are not fetched again.
    pub fn with_cache(
        registry: ProviderRegistry,
        items: Vec<LookupItem>,
        mut options: EngineOptions,
        cache: MetadataCache,
    ) -> Self {
        options.worker_limit = options.worker_limit.max(1);
        options.event_buffer = options.event_buffer.max(2);

        let providers = registry.available();
        let index = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.key.clone(), i))
            .collect();
        let progress = ProgressReporter::new(ProgressSummary {
            total_items: items.len(),
            worker_limit: options.worker_limit,
            active_providers: providers.iter().map(|p| p.name().to_string()).collect(),
            ..Default::default()
        });

        Self {
            inner: Arc::new(EngineInner {
                registry,
                providers,
                items,
                index,
                options,
                cache,
                failures: FailureTracker::new(),
                errors: Mutex::new(Vec::new()),
                progress,
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Collect lookup items from `tree` and build an engine over them.
    pub fn from_tree<C: Classifier>(
        tree: &MediaTree,
        classifier: C,
        registry: ProviderRegistry,
        options: EngineOptions,
    ) -> Self {
        Self::new(registry, collect(tree, classifier), options)
    }

    /// Start the lookup run in the background and return its progress
    /// stream. The stream ends after the final event (`done` or `canceled`).
    ///
    /// An engine runs at most once.
    pub fn start(&self, cancel: CancellationToken) -> Result<ReceiverStream<ProgressEvent>> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(Error::Internal("engine already started".into()));
        }
        let rx = self
            .inner
            .progress
            .attach(self.inner.options.event_buffer)
            .ok_or_else(|| Error::Internal("failed to open progress stream".into()))?;

        info!(
            items = self.inner.items.len(),
            providers = ?self.inner.progress.snapshot().active_providers,
            workers = self.inner.options.worker_limit,
            "Starting lookup run"
        );
        tokio::spawn(runner::run_phases(Arc::clone(&self.inner), cancel));
        Ok(ReceiverStream::new(rx))
    }

    /// Run to completion, draining the progress stream, and return the final
    /// summary.
    pub async fn run(&self, cancel: CancellationToken) -> Result<ProgressSummary> {
        let mut stream = self.start(cancel)?;
        let mut last = self.progress();
        while let Some(event) = stream.next().await {
            last = event.summary;
        }
        Ok(last)
    }

    pub fn items(&self) -> &[LookupItem] {
        &self.inner.items
    }

    pub fn item(&self, key: &str) -> Option<&LookupItem> {
        self.inner.index.get(key).map(|&i| &self.inner.items[i])
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.inner.cache
    }

    pub fn metadata(&self, key: &str) -> Option<MediaMetadata> {
        self.inner.cache.get(key)
    }

    /// Copy of every resolved record, keyed by lookup key.
    pub fn metadata_snapshot(&self) -> HashMap<String, MediaMetadata> {
        self.inner.cache.snapshot()
    }

    /// Outstanding "not found" lookups, ordered by key then provider.
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.inner.failures.list()
    }

    pub fn errors(&self) -> Vec<TerminalError> {
        self.inner.errors.lock().clone()
    }

    pub fn progress(&self) -> ProgressSummary {
        self.inner.progress.snapshot()
    }

    /// Re-run one provider for one item, optionally with a corrected query.
    ///
    /// Without `query`, the query from the tracked failure is reused, or the
    /// item's own name if nothing was tracked.
    ///
    /// Returns `Ok(None)` once the lookup succeeds and drops the failure
    /// entry. A primary result is overlaid on the cached record; any other
    /// provider only fills the fields the record is still missing.
    /// Returns the updated [`FailureRecord`] if the provider still finds
    /// nothing. Any other provider error is returned as
    /// [`Error::Provider`] and moved to the terminal list.
    pub async fn retry(
        &self,
        cancel: &CancellationToken,
        key: &str,
        provider: ProviderKind,
        query: Option<&str>,
    ) -> Result<Option<FailureRecord>> {
        let inner = &self.inner;
        let item = self
            .item(key)
            .cloned()
            .ok_or_else(|| Error::not_found("lookup key", key))?;
        let adapter = inner
            .registry
            .get(provider)
            .filter(|p| p.is_available())
            .ok_or(Error::ProviderNotConfigured(provider))?;

        let previous = inner.failures.get(key, provider).map(|f| f.query);
        let query = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(String::from)
            .or(previous);
        let parent = item.parent_key.as_deref().and_then(|k| inner.cache.get(k));

        let (sent, outcome) = lookup::fetch_one(
            adapter.as_ref(),
            &inner.options.backoff,
            &item,
            query.as_deref(),
            parent.as_ref(),
            cancel,
        )
        .await;

        let result = match outcome {
            Ok(found) => {
                if let Some(fresh) = found {
                    if provider == ProviderKind::Primary {
                        let merged = overlay(&fresh, inner.cache.get(key).as_ref());
                        inner.cache.replace(key, merged);
                    } else {
                        inner.cache.set(key, fresh);
                    }
                }
                inner.failures.resolve(key, provider);
                info!(key, provider = adapter.name(), query = %sent, "Retry succeeded");
                Ok(None)
            }
            Err(ProviderError::Cancelled) => Err(Error::Cancelled),
            Err(e) if e.is_not_found() => {
                info!(key, provider = adapter.name(), query = %sent, "Retry found no match");
                Ok(inner.failures.record(&item, provider, &sent, &e))
            }
            Err(e) => {
                warn!(key, provider = adapter.name(), query = %sent, error = %e, "Retry failed");
                inner.failures.resolve(key, provider);
                inner.errors.lock().push(TerminalError {
                    key: key.to_string(),
                    provider,
                    provider_name: adapter.name().to_string(),
                    source: e.clone(),
                });
                Err(Error::provider(provider, e))
            }
        };

        inner.refresh_error_count();
        result
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("items", &self.inner.items.len())
            .field("providers", &self.inner.providers.len())
            .field("cached", &self.inner.cache.len())
            .finish()
    }
}

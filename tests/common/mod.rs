//! Shared test harness for integration tests.
//!
//! Provides a scriptable [`StubProvider`], a table-driven
//! [`StubClassifier`] and builders for the small media trees the engine
//! tests run against.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use reelname::config::ProviderOptions;
use reelname::engine::{Engine, EngineOptions};
use reelname::metadata::{
    BackoffPolicy, Capabilities, LookupRequest, MediaMetadata, MetadataProvider, ProviderRegistry,
};
use reelname::scanner::{
    Classifier, Detection, LookupItem, MediaGuess, MediaNode, MediaTree, NodeRef,
};
use reelname::{MediaKind, ProviderError, ProviderKind, Result};

pub type Reply = std::result::Result<Option<MediaMetadata>, ProviderError>;
type Responder = dyn Fn(&LookupRequest) -> Reply + Send + Sync;

/// Provider whose answers come from a closure. Records every request and
/// the peak number of concurrent calls.
pub struct StubProvider {
    name: &'static str,
    kind: ProviderKind,
    available: bool,
    kinds: &'static [MediaKind],
    responder: Box<Responder>,
    delay: Duration,
    hang_on: Vec<MediaKind>,
    calls: Mutex<Vec<LookupRequest>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl StubProvider {
    pub fn new(
        name: &'static str,
        kind: ProviderKind,
        responder: impl Fn(&LookupRequest) -> Reply + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            kind,
            available: true,
            kinds: Capabilities::ALL.media_kinds,
            responder: Box::new(responder),
            delay: Duration::ZERO,
            hang_on: Vec::new(),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn primary(responder: impl Fn(&LookupRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self::new("tmdb", ProviderKind::Primary, responder)
    }

    pub fn secondary(responder: impl Fn(&LookupRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self::new("omdb", ProviderKind::Secondary, responder)
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Block requests of `kind` until the run is cancelled.
    pub fn hang_on(mut self, kind: MediaKind) -> Self {
        self.hang_on.push(kind);
        self
    }

    pub fn supporting(mut self, kinds: &'static [MediaKind]) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn calls(&self) -> Vec<LookupRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for(&self, kind: MediaKind) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|r| r.media_kind == kind)
            .count()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProvider for StubProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn configure(&mut self, _options: &ProviderOptions) -> Result<()> {
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            media_kinds: self.kinds,
        }
    }

    async fn fetch(&self, request: &LookupRequest, cancel: &CancellationToken) -> Reply {
        self.calls.lock().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if self.hang_on.contains(&request.media_kind) {
            cancel.cancelled().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(ProviderError::Cancelled);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.responder)(request)
    }
}

/// A record with a title, a confidence and one external id.
pub fn found(title: &str, provider: &str, id: &str) -> MediaMetadata {
    let mut meta = MediaMetadata {
        title: Some(title.to_string()),
        confidence: 0.9,
        ..Default::default()
    };
    meta.external_ids.insert(provider.to_string(), id.to_string());
    meta.sources.insert(provider.to_string(), provider.to_string());
    meta
}

/// Primary stub that "finds" everything, giving shows id `show-1` and
/// everything else an id derived from the request.
pub fn finding_everything() -> StubProvider {
    StubProvider::primary(|req| {
        let id = match req.media_kind {
            MediaKind::Show => "show-1".to_string(),
            _ => format!(
                "{}-{}-{}",
                req.media_kind,
                req.season.unwrap_or(0),
                req.episode.unwrap_or(0)
            ),
        };
        let title = match req.media_kind {
            MediaKind::Season | MediaKind::Episode => None,
            _ => Some(req.name.clone()),
        };
        let mut meta = found(&req.name, "tmdb", &id);
        meta.title = title;
        Ok(Some(meta))
    })
}

pub fn registry_with(providers: Vec<Arc<StubProvider>>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(provider);
    }
    registry
}

/// Options with a tiny backoff unit so rate-limit tests finish quickly.
pub fn fast_options(worker_limit: usize) -> EngineOptions {
    EngineOptions {
        worker_limit,
        event_buffer: 16,
        backoff: BackoffPolicy::new(Duration::from_millis(1), 5),
    }
}

/// Classifier driven by a file-name lookup table. Unlisted nodes are
/// unknown.
#[derive(Default, Clone)]
pub struct StubClassifier {
    table: HashMap<String, Detection>,
}

impl StubClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: &str, kind: MediaKind, guess: MediaGuess) -> Self {
        self.table
            .insert(file_name.to_string(), Detection::new(kind, guess));
        self
    }
}

impl Classifier for StubClassifier {
    fn detect(&self, node: &MediaNode) -> Result<Detection> {
        let name = node
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self
            .table
            .get(&name)
            .cloned()
            .unwrap_or_else(Detection::unknown))
    }
}

/// `/media/Inception (2010)/Inception.2010.mkv`
pub fn inception_tree() -> (MediaTree, StubClassifier) {
    let mut tree = MediaTree::new("/media", true);
    let root = tree.root().unwrap();
    let dir = tree.add_child(root, "Inception (2010)", true).unwrap();
    tree.add_child(dir, "Inception.2010.mkv", false).unwrap();

    let classifier = StubClassifier::new()
        .with(
            "Inception (2010)",
            MediaKind::Movie,
            MediaGuess::titled("Inception").with_year(2010),
        )
        .with(
            "Inception.2010.mkv",
            MediaKind::Movie,
            MediaGuess::titled("Inception").with_year(2010),
        );
    (tree, classifier)
}

/// `/tv/The Office/Season 1/S01E0{1,2}.mkv`
pub fn office_tree() -> (MediaTree, StubClassifier) {
    let mut tree = MediaTree::new("/tv", true);
    let root = tree.root().unwrap();
    let show = tree.add_child(root, "The Office", true).unwrap();
    let season = tree.add_child(show, "Season 1", true).unwrap();
    tree.add_child(season, "S01E01.mkv", false).unwrap();
    tree.add_child(season, "S01E02.mkv", false).unwrap();

    let classifier = StubClassifier::new()
        .with("The Office", MediaKind::Show, MediaGuess::titled("The Office"))
        .with(
            "Season 1",
            MediaKind::Season,
            MediaGuess::titled("The Office").with_season(1),
        )
        .with(
            "S01E01.mkv",
            MediaKind::Episode,
            MediaGuess::titled("The Office").with_season(1).with_episode(1),
        )
        .with(
            "S01E02.mkv",
            MediaKind::Episode,
            MediaGuess::titled("The Office").with_season(1).with_episode(2),
        );
    (tree, classifier)
}

/// Build an engine over `tree` with the given providers.
pub fn engine_for(
    (tree, classifier): (MediaTree, StubClassifier),
    providers: Vec<Arc<StubProvider>>,
    options: EngineOptions,
) -> Engine {
    Engine::from_tree(&tree, classifier, registry_with(providers), options)
}

/// A movie item pointing at `/movies/<name>.mkv`.
pub fn movie_item(name: &str, year: Option<u16>) -> LookupItem {
    let tree = MediaTree::new(format!("/movies/{name}.mkv"), false);
    let node = NodeRef::from(tree.node(tree.root().unwrap()).unwrap());
    LookupItem::new(MediaKind::Movie, name, year, None, None, node)
}

//! Node classification.
//!
//! Parsing filenames into show/season/episode/movie guesses is the job of
//! whoever embeds the engine. This module only defines the contract
//! ([`Classifier`]) and a per-run memo around it ([`CachedClassifier`]).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use reelname_common::{MediaKind, Result};
use tracing::{debug, warn};

use super::{MediaNode, NodeId};

/// Best-effort metadata extracted from a node's name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaGuess {
    pub title: Option<String>,
    pub year: Option<u16>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl MediaGuess {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn with_year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_season(mut self, season: u32) -> Self {
        self.season = Some(season);
        self
    }

    pub fn with_episode(mut self, episode: u32) -> Self {
        self.episode = Some(episode);
        self
    }
}

/// What a [`Classifier`] decided about a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub kind: MediaKind,
    pub guess: Option<MediaGuess>,
}

impl Detection {
    pub fn new(kind: MediaKind, guess: MediaGuess) -> Self {
        Self {
            kind,
            guess: Some(guess),
        }
    }

    pub fn unknown() -> Self {
        Self {
            kind: MediaKind::Unknown,
            guess: None,
        }
    }
}

/// Classifies a single tree node.
pub trait Classifier: Send + Sync {
    fn detect(&self, node: &MediaNode) -> Result<Detection>;
}

impl<F> Classifier for F
where
    F: Fn(&MediaNode) -> Result<Detection> + Send + Sync,
{
    fn detect(&self, node: &MediaNode) -> Result<Detection> {
        self(node)
    }
}

impl<C: Classifier + ?Sized> Classifier for Arc<C> {
    fn detect(&self, node: &MediaNode) -> Result<Detection> {
        (**self).detect(node)
    }
}

/// Memoizes a [`Classifier`] per node identity.
///
/// Failures go into a separate negative set so a node that failed once is
/// never handed to the inner classifier again. Nothing is evicted; the memo
/// lives as long as one collection run.
pub struct CachedClassifier<C> {
    inner: C,
    hits: Mutex<HashMap<NodeId, Detection>>,
    failed: Mutex<HashSet<NodeId>>,
}

impl<C: Classifier> CachedClassifier<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            hits: Mutex::new(HashMap::new()),
            failed: Mutex::new(HashSet::new()),
        }
    }

    /// Classify `node`, or `None` if classification failed (now or before).
    pub fn classify(&self, node: &MediaNode) -> Option<Detection> {
        if self.failed.lock().contains(&node.id) {
            return None;
        }
        if let Some(hit) = self.hits.lock().get(&node.id) {
            return Some(hit.clone());
        }

        match self.inner.detect(node) {
            Ok(detection) => {
                debug!(node = %node.id, kind = %detection.kind, "Classified {:?}", node.path);
                self.hits.lock().insert(node.id, detection.clone());
                Some(detection)
            }
            Err(e) => {
                warn!(node = %node.id, "Classification failed for {:?}: {}", node.path, e);
                self.failed.lock().insert(node.id);
                None
            }
        }
    }

    pub fn is_failed(&self, id: NodeId) -> bool {
        self.failed.lock().contains(&id)
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

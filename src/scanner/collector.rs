//! Turns a classified tree into deduplicated lookup items.

use std::collections::HashMap;
use std::path::PathBuf;

use reelname_common::paths::is_video_file;
use reelname_common::{MediaKind, Phase};
use tracing::{debug, info};

use super::classifier::{CachedClassifier, Classifier, MediaGuess};
use super::{MediaNode, MediaTree, NodeId};

/// Read-only reference to the tree node an item was collected from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub id: NodeId,
    pub path: PathBuf,
    pub is_dir: bool,
}

impl NodeRef {
    pub fn is_video(&self) -> bool {
        !self.is_dir && is_video_file(&self.path)
    }
}

impl From<&MediaNode> for NodeRef {
    fn from(node: &MediaNode) -> Self {
        Self {
            id: node.id,
            path: node.path.clone(),
            is_dir: node.is_dir,
        }
    }
}

/// One deduplicated metadata request.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupItem {
    /// Stable identity, see [`lookup_key`].
    pub key: String,
    pub display_name: String,
    pub year: Option<u16>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub is_movie: bool,
    pub media_kind: MediaKind,
    pub phase: Phase,
    pub node: NodeRef,
    /// Key of the implied show item for seasons and episodes.
    pub parent_key: Option<String>,
}

impl LookupItem {
    pub fn new(
        media_kind: MediaKind,
        display_name: impl Into<String>,
        year: Option<u16>,
        season: Option<u32>,
        episode: Option<u32>,
        node: NodeRef,
    ) -> Self {
        let display_name = display_name.into();
        Self {
            key: lookup_key(media_kind, &display_name, year, season, episode),
            display_name,
            year,
            season,
            episode,
            is_movie: media_kind == MediaKind::Movie,
            media_kind,
            phase: media_kind.phase().unwrap_or(Phase::Titles),
            node,
            parent_key: None,
        }
    }

    pub fn with_parent(mut self, parent_key: impl Into<String>) -> Self {
        self.parent_key = Some(parent_key.into());
        self
    }

    /// Short label for progress output, e.g. `The Office S01E02`.
    pub fn describe(&self) -> String {
        match self.media_kind {
            MediaKind::Movie => match self.year {
                Some(y) => format!("{} ({})", self.display_name, y),
                None => self.display_name.clone(),
            },
            MediaKind::Season => {
                format!("{} S{:02}", self.display_name, self.season.unwrap_or(0))
            }
            MediaKind::Episode => format!(
                "{} S{:02}E{:02}",
                self.display_name,
                self.season.unwrap_or(0),
                self.episode.unwrap_or(0)
            ),
            _ => self.display_name.clone(),
        }
    }
}

/// Lowercase and collapse every run of non-alphanumerics to one space.
pub fn normalize_title(title: &str) -> String {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `kind|normalized title|year|season|episode`, with `0` for absent numbers.
pub fn lookup_key(
    kind: MediaKind,
    title: &str,
    year: Option<u16>,
    season: Option<u32>,
    episode: Option<u32>,
) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        kind.as_str(),
        normalize_title(title),
        year.unwrap_or(0),
        season.unwrap_or(0),
        episode.unwrap_or(0)
    )
}

/// Whether `candidate` should replace `current` as an item's node.
///
/// Files beat directories, video files beat other files, and otherwise the
/// occurrence that filled in a missing name or year wins.
pub fn prefer_candidate(current: &NodeRef, candidate: &NodeRef, supplies_missing: bool) -> bool {
    if current.is_dir != candidate.is_dir {
        return current.is_dir;
    }
    if !candidate.is_dir {
        let (cur_video, cand_video) = (current.is_video(), candidate.is_video());
        if cur_video != cand_video {
            return cand_video;
        }
    }
    supplies_missing
}

/// Walks a [`MediaTree`] and builds the item list the engine runs on.
pub struct ItemCollector<C> {
    classifier: CachedClassifier<C>,
}

impl<C: Classifier> ItemCollector<C> {
    pub fn new(classifier: C) -> Self {
        Self {
            classifier: CachedClassifier::new(classifier),
        }
    }

    pub fn classifier(&self) -> &CachedClassifier<C> {
        &self.classifier
    }

    /// Classify every node breadth-first and return one item per key.
    ///
    /// Season and episode nodes also emit their implied show item so the
    /// show is resolved in the first phase.
    pub fn collect(&self, tree: &MediaTree) -> Vec<LookupItem> {
        let mut items = Items::default();

        for node in tree.breadth_first() {
            let Some(detection) = self.classifier.classify(node) else {
                continue;
            };
            let guess = detection.guess.unwrap_or_default();
            let MediaGuess {
                title,
                year,
                season,
                episode,
            } = guess;
            let title = title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| node.name());
            let node_ref = NodeRef::from(node);

            match detection.kind {
                MediaKind::Movie | MediaKind::Show => {
                    items.upsert(LookupItem::new(
                        detection.kind,
                        title,
                        year,
                        None,
                        None,
                        node_ref,
                    ));
                }
                MediaKind::Season => {
                    let show = LookupItem::new(
                        MediaKind::Show,
                        title.clone(),
                        year,
                        None,
                        None,
                        node_ref.clone(),
                    );
                    let show_key = items.upsert(show);
                    items.upsert(
                        LookupItem::new(MediaKind::Season, title, year, season, None, node_ref)
                            .with_parent(show_key),
                    );
                }
                MediaKind::Episode => {
                    let show = LookupItem::new(
                        MediaKind::Show,
                        title.clone(),
                        year,
                        None,
                        None,
                        node_ref.clone(),
                    );
                    let show_key = items.upsert(show);
                    items.upsert(
                        LookupItem::new(
                            MediaKind::Episode,
                            title,
                            year,
                            season,
                            episode,
                            node_ref,
                        )
                        .with_parent(show_key),
                    );
                }
                MediaKind::Unknown => {}
            }
        }

        info!("Collected {} lookup items from {} nodes", items.list.len(), tree.len());
        items.list
    }
}

/// Convenience wrapper for a one-shot collection.
pub fn collect<C: Classifier>(tree: &MediaTree, classifier: C) -> Vec<LookupItem> {
    ItemCollector::new(classifier).collect(tree)
}

#[derive(Default)]
struct Items {
    list: Vec<LookupItem>,
    index: HashMap<String, usize>,
}

impl Items {
    /// Insert `candidate` or backfill the existing item with the same key.
    fn upsert(&mut self, candidate: LookupItem) -> String {
        let key = candidate.key.clone();
        let Some(&i) = self.index.get(&key) else {
            self.index.insert(key.clone(), self.list.len());
            self.list.push(candidate);
            return key;
        };

        let existing = &mut self.list[i];
        let supplies_missing = (existing.display_name.trim().is_empty()
            && !candidate.display_name.trim().is_empty())
            || (existing.year.is_none() && candidate.year.is_some());

        if prefer_candidate(&existing.node, &candidate.node, supplies_missing) {
            debug!(key = %key, "Swapping node to {:?}", candidate.node.path);
            existing.node = candidate.node;
        }

        if existing.display_name.trim().is_empty() {
            existing.display_name = candidate.display_name;
        }
        existing.year = existing.year.or(candidate.year);
        existing.season = existing.season.or(candidate.season);
        existing.episode = existing.episode.or(candidate.episode);
        if existing.parent_key.is_none() {
            existing.parent_key = candidate.parent_key;
        }
        key
    }
}

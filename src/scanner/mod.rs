//! Media tree scanning and lookup-item collection.
//!
//! A [`MediaTree`] is the read-only view of the directory being renamed.
//! The [`ItemCollector`] walks it breadth-first, classifies each node through
//! a caller-supplied [`Classifier`], and turns the result into deduplicated
//! [`LookupItem`]s for the engine.

pub mod classifier;
pub mod collector;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use reelname_common::paths::{display_stem, is_video_file};
use reelname_common::{Error, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub use classifier::{CachedClassifier, Classifier, Detection, MediaGuess};
pub use collector::{collect, lookup_key, normalize_title, ItemCollector, LookupItem, NodeRef};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identity.
///
/// Two nodes with identical paths in different trees still get different
/// ids, so anything keyed by `NodeId` is keyed by reference, not content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// A single file or directory in a [`MediaTree`].
#[derive(Debug, Clone)]
pub struct MediaNode {
    pub id: NodeId,
    pub path: PathBuf,
    pub is_dir: bool,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl MediaNode {
    /// File stem for files, full name for directories.
    pub fn name(&self) -> String {
        display_stem(&self.path, self.is_dir)
    }

    /// `true` for files with a video extension.
    pub fn is_video(&self) -> bool {
        !self.is_dir && is_video_file(&self.path)
    }
}

/// An arena of [`MediaNode`]s rooted at a single path.
#[derive(Debug, Default)]
pub struct MediaTree {
    nodes: HashMap<NodeId, MediaNode>,
    root: Option<NodeId>,
}

impl MediaTree {
    /// Create a tree containing only its root node.
    pub fn new(root: impl Into<PathBuf>, is_dir: bool) -> Self {
        let id = NodeId::next();
        let mut nodes = HashMap::new();
        nodes.insert(
            id,
            MediaNode {
                id,
                path: root.into(),
                is_dir,
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            nodes,
            root: Some(id),
        }
    }

    /// Build a tree from the filesystem below `root`.
    ///
    /// Entries are visited in file-name order and symlinks are followed.
    /// Unreadable entries are logged and skipped.
    pub fn scan(root: &Path) -> Result<Self> {
        let meta = std::fs::metadata(root)?;
        let mut tree = Self::new(root, meta.is_dir());
        let Some(root_id) = tree.root else {
            return Ok(tree);
        };

        let mut dirs: HashMap<PathBuf, NodeId> = HashMap::new();
        dirs.insert(root.to_path_buf(), root_id);

        for entry in WalkDir::new(root)
            .follow_links(true)
            .min_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry under {:?}: {}", root, e);
                    continue;
                }
            };

            let path = entry.path();
            let Some(parent) = path.parent().and_then(|p| dirs.get(p)).copied() else {
                debug!("No parent node for {:?}; skipping", path);
                continue;
            };

            let is_dir = entry.file_type().is_dir();
            let id = tree.insert(parent, path.to_path_buf(), is_dir);
            if is_dir {
                dirs.insert(path.to_path_buf(), id);
            }
        }

        info!("Scanned {:?}: {} nodes", root, tree.len());
        Ok(tree)
    }

    /// Append a child named `name` below `parent`.
    pub fn add_child(&mut self, parent: NodeId, name: &str, is_dir: bool) -> Result<NodeId> {
        let parent_path = self
            .nodes
            .get(&parent)
            .map(|n| n.path.join(name))
            .ok_or_else(|| Error::not_found("node", parent))?;
        Ok(self.insert(parent, parent_path, is_dir))
    }

    fn insert(&mut self, parent: NodeId, path: PathBuf, is_dir: bool) -> NodeId {
        let id = NodeId::next();
        self.nodes.insert(
            id,
            MediaNode {
                id,
                path,
                is_dir,
                parent: Some(parent),
                children: Vec::new(),
            },
        );
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        id
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&MediaNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, parents before children, siblings in insertion order.
    pub fn breadth_first(&self) -> Vec<&MediaNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut queue: VecDeque<NodeId> = self.root.into_iter().collect();

        while let Some(id) = queue.pop_front() {
            if let Some(node) = self.nodes.get(&id) {
                out.push(node);
                queue.extend(node.children.iter().copied());
            }
        }
        out
    }
}

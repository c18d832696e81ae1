//! Run-scoped key to metadata table.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::metadata::MediaMetadata;

/// Concurrency-safe metadata cache keyed by lookup key.
///
/// Cloning shares the underlying table. A stored record only grows through
/// [`set`](Self::set); [`replace`](Self::replace) is reserved for manual
/// retries.
#[derive(Debug, Clone, Default)]
pub struct MetadataCache {
    entries: Arc<DashMap<String, MediaMetadata>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<MediaMetadata> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Store `metadata`, or fold it into the existing record without
    /// overwriting anything already there. Returns `true` if the table
    /// changed.
    pub fn set(&self, key: impl Into<String>, metadata: MediaMetadata) -> bool {
        match self.entries.entry(key.into()) {
            Entry::Occupied(mut existing) => existing.get_mut().fill_from(&metadata),
            Entry::Vacant(slot) => {
                slot.insert(metadata);
                true
            }
        }
    }

    /// Overwrite the record for `key`.
    pub fn replace(&self, key: impl Into<String>, metadata: MediaMetadata) {
        self.entries.insert(key.into(), metadata);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Point-in-time copy of every entry.
    pub fn snapshot(&self) -> HashMap<String, MediaMetadata> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(title: &str) -> MediaMetadata {
        MediaMetadata {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    #[test]
    fn set_never_overwrites() {
        let cache = MetadataCache::new();
        assert!(cache.set("k", titled("First")));

        let mut more = titled("Second");
        more.year = Some(2001);
        assert!(cache.set("k", more.clone()));
        assert!(!cache.set("k", more));

        let stored = cache.get("k").unwrap();
        assert_eq!(stored.title.as_deref(), Some("First"));
        assert_eq!(stored.year, Some(2001));
    }

    #[test]
    fn replace_overwrites() {
        let cache = MetadataCache::new();
        cache.set("k", titled("First"));
        cache.replace("k", titled("Second"));
        assert_eq!(cache.get("k").unwrap().title.as_deref(), Some("Second"));
    }

    #[test]
    fn clones_share_entries() {
        let cache = MetadataCache::new();
        let other = cache.clone();
        other.set("k", titled("Shared"));
        assert!(cache.contains("k"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.snapshot().len(), 1);
        assert!(cache.get("missing").is_none());
    }
}

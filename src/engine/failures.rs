//! Tracking of user-correctable "not found" lookups.

use std::collections::HashMap;

use parking_lot::Mutex;
use reelname_common::{ProviderError, ProviderKind};
use serde::Serialize;

use crate::scanner::LookupItem;

/// A lookup a provider could not match, kept until a retry succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureRecord {
    pub item: LookupItem,
    pub provider: ProviderKind,
    /// The query string used by the most recent attempt.
    pub query: String,
    pub error: ProviderError,
    pub attempts: u32,
}

/// Stable identity of a failure entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FailureKey {
    pub key: String,
    pub provider: ProviderKind,
}

/// Failure records keyed by (lookup key, provider).
#[derive(Debug, Default)]
pub struct FailureTracker {
    entries: Mutex<HashMap<FailureKey, FailureRecord>>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a not-found outcome. Any other error is ignored and `None` is
    /// returned. Repeats update the stored query and error and bump the
    /// attempt counter.
    pub fn record(
        &self,
        item: &LookupItem,
        provider: ProviderKind,
        query: &str,
        error: &ProviderError,
    ) -> Option<FailureRecord> {
        if !error.is_not_found() {
            return None;
        }

        let id = FailureKey {
            key: item.key.clone(),
            provider,
        };
        let mut entries = self.entries.lock();
        let record = entries
            .entry(id)
            .and_modify(|r| {
                r.attempts += 1;
                r.query = query.to_string();
                r.error = error.clone();
            })
            .or_insert_with(|| FailureRecord {
                item: item.clone(),
                provider,
                query: query.to_string(),
                error: error.clone(),
                attempts: 1,
            });
        Some(record.clone())
    }

    pub fn get(&self, key: &str, provider: ProviderKind) -> Option<FailureRecord> {
        self.entries
            .lock()
            .get(&FailureKey {
                key: key.to_string(),
                provider,
            })
            .cloned()
    }

    /// Drop the entry, returning it if there was one.
    pub fn resolve(&self, key: &str, provider: ProviderKind) -> Option<FailureRecord> {
        self.entries.lock().remove(&FailureKey {
            key: key.to_string(),
            provider,
        })
    }

    /// Snapshot of every entry, ordered by key then provider.
    pub fn list(&self) -> Vec<FailureRecord> {
        let entries = self.entries.lock();
        let mut ids: Vec<&FailureKey> = entries.keys().collect();
        ids.sort();
        ids.into_iter()
            .filter_map(|id| entries.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

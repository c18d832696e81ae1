//! Combining several providers' answers for one item.
//!
//! Precedence is asymmetric: the primary provider's record is the base, the
//! secondary sources only fill what it left empty, and the filename-derived
//! fields of the item come last. Confidence is the one field where every
//! source competes; the highest wins.

use super::record::MediaMetadata;
use crate::scanner::LookupItem;

/// Merge provider results for `item`.
///
/// Returns `None` only when no provider produced anything and the item has
/// no local name to fall back on.
pub fn merge(
    item: &LookupItem,
    primary: Option<&MediaMetadata>,
    secondaries: &[MediaMetadata],
) -> Option<MediaMetadata> {
    let local = MediaMetadata::from_item(item);
    if primary.is_none() && secondaries.is_empty() && !local.has_title() {
        return None;
    }

    let mut record = match primary {
        Some(p) => p.clone(),
        None => local.clone(),
    };
    for secondary in secondaries {
        record.fill_from(secondary);
    }
    if primary.is_some() {
        record.fill_core(&local);
    }
    Some(record)
}

/// Overlay a manually retried result on top of the cached record.
///
/// `fresh` plays the primary role: its fields win, and the existing record
/// only fills gaps.
pub fn overlay(fresh: &MediaMetadata, existing: Option<&MediaMetadata>) -> MediaMetadata {
    let mut record = fresh.clone();
    if let Some(existing) = existing {
        record.fill_from(existing);
    }
    record
}

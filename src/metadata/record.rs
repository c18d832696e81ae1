//! The merged metadata record stored per lookup key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scanner::LookupItem;

/// Metadata for one lookup item, possibly assembled from several providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: Option<String>,
    pub year: Option<u16>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub overview: Option<String>,
    /// Audience rating on a 0-10 scale.
    pub rating: Option<f64>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    /// Provider-specific fields (`runtime`, `video_codec`, ...).
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
    /// Provider name to human-readable source label.
    #[serde(default)]
    pub sources: BTreeMap<String, String>,
    /// External identifiers, keyed by provider (`tmdb`, `imdb`,
    /// `show.tmdb`, ...).
    #[serde(default)]
    pub external_ids: BTreeMap<String, String>,
    /// Best match confidence across contributing sources, 0.0 - 1.0.
    #[serde(default)]
    pub confidence: f64,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn fill_string(slot: &mut Option<String>, other: &Option<String>) -> bool {
    if is_blank(slot) && !is_blank(other) {
        slot.clone_from(other);
        return true;
    }
    false
}

fn fill<T: Copy>(slot: &mut Option<T>, other: Option<T>) -> bool {
    if slot.is_none() && other.is_some() {
        *slot = other;
        return true;
    }
    false
}

fn fill_map(slot: &mut BTreeMap<String, String>, other: &BTreeMap<String, String>) -> bool {
    let mut changed = false;
    for (k, v) in other {
        if !slot.contains_key(k) {
            slot.insert(k.clone(), v.clone());
            changed = true;
        }
    }
    changed
}

impl MediaMetadata {
    /// A record carrying only what the filename told us.
    pub fn from_item(item: &LookupItem) -> Self {
        let title = Some(item.display_name.clone()).filter(|t| !t.trim().is_empty());
        Self {
            title,
            year: item.year,
            season: item.season,
            episode: item.episode,
            ..Default::default()
        }
    }

    pub fn has_title(&self) -> bool {
        !is_blank(&self.title)
    }

    /// Fill title, year, season and episode where they are still empty.
    pub fn fill_core(&mut self, other: &MediaMetadata) -> bool {
        let mut changed = fill_string(&mut self.title, &other.title);
        changed |= fill(&mut self.year, other.year);
        changed |= fill(&mut self.season, other.season);
        changed |= fill(&mut self.episode, other.episode);
        changed
    }

    /// Absorb everything `other` knows that `self` does not.
    ///
    /// Never overwrites a populated field. Confidence takes the maximum.
    /// Returns `true` if anything was added.
    pub fn fill_from(&mut self, other: &MediaMetadata) -> bool {
        let mut changed = self.fill_core(other);
        changed |= fill_string(&mut self.overview, &other.overview);
        changed |= fill(&mut self.rating, other.rating);
        if self.genres.is_empty() && !other.genres.is_empty() {
            self.genres.clone_from(&other.genres);
            changed = true;
        }
        changed |= fill_string(&mut self.language, &other.language);
        changed |= fill_string(&mut self.country, &other.country);
        changed |= fill_map(&mut self.extensions, &other.extensions);
        changed |= fill_map(&mut self.sources, &other.sources);
        changed |= fill_map(&mut self.external_ids, &other.external_ids);
        if other.confidence > self.confidence {
            self.confidence = other.confidence;
            changed = true;
        }
        changed
    }

    /// Copy a parent show's external ids as `show.<provider>`.
    pub fn inherit_show_ids(&mut self, parent: &MediaMetadata) {
        for (provider, id) in &parent.external_ids {
            if provider.starts_with("show.") {
                continue;
            }
            self.external_ids
                .entry(format!("show.{provider}"))
                .or_insert_with(|| id.clone());
        }
    }

    /// Attribute this record to `provider`.
    pub fn with_source(mut self, provider: &str, label: &str) -> Self {
        self.sources.insert(provider.to_string(), label.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_from_only_fills_gaps() {
        let mut a = MediaMetadata {
            title: Some("Show A".into()),
            rating: Some(7.0),
            confidence: 0.4,
            ..Default::default()
        };
        a.external_ids.insert("tmdb".into(), "1".into());

        let mut b = MediaMetadata {
            title: Some("Show B".into()),
            year: Some(2001),
            rating: Some(9.0),
            genres: vec!["Drama".into()],
            confidence: 0.9,
            ..Default::default()
        };
        b.external_ids.insert("tmdb".into(), "2".into());
        b.external_ids.insert("imdb".into(), "tt2".into());

        assert!(a.fill_from(&b));
        assert_eq!(a.title.as_deref(), Some("Show A"));
        assert_eq!(a.year, Some(2001));
        assert_eq!(a.rating, Some(7.0));
        assert_eq!(a.genres, vec!["Drama"]);
        assert_eq!(a.external_ids["tmdb"], "1");
        assert_eq!(a.external_ids["imdb"], "tt2");
        assert!((a.confidence - 0.9).abs() < f64::EPSILON);

        // nothing new the second time
        assert!(!a.fill_from(&b));
    }

    #[test]
    fn blank_strings_count_as_empty() {
        let mut a = MediaMetadata {
            title: Some("  ".into()),
            ..Default::default()
        };
        let b = MediaMetadata {
            title: Some("Show B".into()),
            ..Default::default()
        };
        assert!(!a.has_title());
        a.fill_core(&b);
        assert_eq!(a.title.as_deref(), Some("Show B"));
    }

    #[test]
    fn inherit_show_ids_prefixes() {
        let mut parent = MediaMetadata::default();
        parent.external_ids.insert("tmdb".into(), "1396".into());
        parent.external_ids.insert("show.omdb".into(), "x".into());

        let mut child = MediaMetadata::default();
        child.inherit_show_ids(&parent);
        assert_eq!(child.external_ids.len(), 1);
        assert_eq!(child.external_ids["show.tmdb"], "1396");
    }
}

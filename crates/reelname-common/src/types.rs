//! Core type definitions for media kinds, lookup phases, and providers.
//!
//! All enums serialize in lowercase.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of a filesystem node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// A TV series as a whole.
    Show,
    /// A season within a series.
    Season,
    /// A single episode within a season.
    Episode,
    /// A single movie.
    Movie,
    /// Anything the classifier could not place (subtitles, extras, ...).
    Unknown,
}

impl MediaKind {
    /// The lookup phase an item of this kind belongs to, or `None` for
    /// [`MediaKind::Unknown`].
    pub fn phase(self) -> Option<Phase> {
        match self {
            Self::Show | Self::Movie => Some(Phase::Titles),
            Self::Season => Some(Phase::Seasons),
            Self::Episode => Some(Phase::Episodes),
            Self::Unknown => None,
        }
    }

    /// Stable lowercase label, also used as the first segment of lookup keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::Season => "season",
            Self::Episode => "episode",
            Self::Movie => "movie",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three strictly ordered lookup batches.
///
/// Season and episode lookups need the parent show's provider identity, so
/// every [`Phase::Titles`] item is resolved before any [`Phase::Seasons`]
/// item is dispatched, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Shows and movies.
    Titles,
    /// Seasons.
    Seasons,
    /// Episodes.
    Episodes,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 3] = [Phase::Titles, Phase::Seasons, Phase::Episodes];

    /// Zero-based execution index.
    pub fn index(self) -> usize {
        match self {
            Self::Titles => 0,
            Self::Seasons => 1,
            Self::Episodes => 2,
        }
    }

    /// Human-readable phase name for progress output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Titles => "shows & movies",
            Self::Seasons => "seasons",
            Self::Episodes => "episodes",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The closed set of provider roles the engine knows how to merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// The main metadata source; its naming is the default vocabulary.
    Primary,
    /// A supplementary metadata source that only fills gaps.
    Secondary,
    /// A technical probe of the media file itself.
    Probe,
}

impl ProviderKind {
    /// Stable lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Probe => "probe",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_phases() {
        assert_eq!(MediaKind::Show.phase(), Some(Phase::Titles));
        assert_eq!(MediaKind::Movie.phase(), Some(Phase::Titles));
        assert_eq!(MediaKind::Season.phase(), Some(Phase::Seasons));
        assert_eq!(MediaKind::Episode.phase(), Some(Phase::Episodes));
        assert_eq!(MediaKind::Unknown.phase(), None);
    }

    #[test]
    fn phase_order() {
        let indices: Vec<usize> = Phase::ALL.iter().map(|p| p.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(Phase::Titles < Phase::Seasons);
        assert!(Phase::Seasons < Phase::Episodes);
    }

    #[test]
    fn display_labels() {
        assert_eq!(MediaKind::Episode.to_string(), "episode");
        assert_eq!(ProviderKind::Probe.to_string(), "probe");
        assert_eq!(Phase::Seasons.to_string(), "seasons");
    }

    #[test]
    fn serde_lowercase() {
        let json = serde_json::to_string(&ProviderKind::Secondary).unwrap();
        assert_eq!(json, "\"secondary\"");
        let kind: MediaKind = serde_json::from_str("\"movie\"").unwrap();
        assert_eq!(kind, MediaKind::Movie);
    }
}

//! Trait definition and request types for metadata providers.
//!
//! Every backend (TMDB, OMDb, ffprobe, test stubs) implements
//! [`MetadataProvider`]. The engine never knows which concrete adapter it is
//! talking to, only its [`ProviderKind`], which decides merge precedence.

use std::collections::HashMap;

use async_trait::async_trait;
use reelname_common::{MediaKind, ProviderError, ProviderKind, Result};
use tokio_util::sync::CancellationToken;

use super::record::MediaMetadata;
use crate::config::ProviderOptions;
use crate::scanner::LookupItem;

/// Extra key holding the item's filesystem path.
pub const EXTRA_PATH: &str = "path";

/// Media kinds a provider can answer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub media_kinds: &'static [MediaKind],
}

impl Capabilities {
    pub const ALL: Capabilities = Capabilities {
        media_kinds: &[
            MediaKind::Show,
            MediaKind::Season,
            MediaKind::Episode,
            MediaKind::Movie,
        ],
    };

    pub fn supports(&self, kind: MediaKind) -> bool {
        self.media_kinds.contains(&kind)
    }
}

/// What a provider is asked to look up.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRequest {
    pub media_kind: MediaKind,
    /// The query string: the item's title unless overridden for a retry.
    pub name: String,
    pub year: Option<u16>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// Adapter-specific hints (`path`, `show.tmdb`, ...).
    pub extra: HashMap<String, String>,
}

impl LookupRequest {
    pub fn from_item(item: &LookupItem) -> Self {
        let mut extra = HashMap::new();
        extra.insert(
            EXTRA_PATH.to_string(),
            item.node.path.to_string_lossy().into_owned(),
        );
        Self {
            media_kind: item.media_kind,
            name: item.display_name.clone(),
            year: item.year,
            season: item.season,
            episode: item.episode,
            extra,
        }
    }

    /// Thread a resolved parent show's ids through as `show.<provider>`.
    pub fn with_parent(mut self, parent: &MediaMetadata) -> Self {
        for (provider, id) in &parent.external_ids {
            if provider.starts_with("show.") {
                continue;
            }
            self.extra.insert(format!("show.{provider}"), id.clone());
        }
        self
    }

    /// Replace the query string, ignoring blank overrides.
    pub fn with_query(mut self, query: Option<&str>) -> Self {
        if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
            self.name = q.to_string();
        }
        self
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }

    /// The parent show's id for `provider`, if phase 0 resolved one.
    pub fn show_id(&self, provider: &str) -> Option<&str> {
        self.extra(&format!("show.{provider}"))
    }
}

/// Async trait that all metadata providers implement.
///
/// `fetch` returns `Ok(None)` when the provider has nothing to contribute
/// for this kind of request, and [`ProviderError::NotFound`] when it looked
/// and found no match. Rate limiting is reported as
/// [`ProviderError::RateLimited`]; the caller owns the backoff.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Short, lowercase identifier for this provider (e.g. `"tmdb"`).
    fn name(&self) -> &'static str;

    /// Which merge role this provider plays.
    fn kind(&self) -> ProviderKind;

    /// Apply options from configuration.
    fn configure(&mut self, options: &ProviderOptions) -> Result<()>;

    /// Returns `true` when the provider has credentials (or a binary) and
    /// is ready to serve requests.
    fn is_available(&self) -> bool;

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    async fn fetch(
        &self,
        request: &LookupRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<MediaMetadata>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{MediaTree, NodeRef};

    fn item() -> LookupItem {
        let tree = MediaTree::new("/tv/The Office/S01E02.mkv", false);
        let node = NodeRef::from(tree.node(tree.root().unwrap()).unwrap());
        LookupItem::new(MediaKind::Episode, "The Office", None, Some(1), Some(2), node)
    }

    #[test]
    fn request_from_item() {
        let req = LookupRequest::from_item(&item());
        assert_eq!(req.name, "The Office");
        assert_eq!(req.season, Some(1));
        assert_eq!(req.extra(EXTRA_PATH), Some("/tv/The Office/S01E02.mkv"));
        assert_eq!(req.show_id("tmdb"), None);
    }

    #[test]
    fn parent_ids_become_show_extras() {
        let mut parent = MediaMetadata::default();
        parent.external_ids.insert("tmdb".into(), "2316".into());

        let req = LookupRequest::from_item(&item()).with_parent(&parent);
        assert_eq!(req.show_id("tmdb"), Some("2316"));
    }

    #[test]
    fn query_override() {
        let req = LookupRequest::from_item(&item()).with_query(Some("The Office (US)"));
        assert_eq!(req.name, "The Office (US)");

        let req = LookupRequest::from_item(&item()).with_query(Some("   "));
        assert_eq!(req.name, "The Office");
    }

    #[test]
    fn capabilities_support() {
        assert!(Capabilities::ALL.supports(MediaKind::Season));
        assert!(!Capabilities::ALL.supports(MediaKind::Unknown));
    }
}

//! Resolving one item against the active providers.

use std::sync::Arc;

use reelname_common::{ProviderError, ProviderKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::metadata::{
    fetch_with_backoff, merge, BackoffPolicy, LookupRequest, MediaMetadata, MetadataProvider,
};
use crate::scanner::LookupItem;

/// A provider call that ended in an error after backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFailure {
    pub provider: ProviderKind,
    pub name: &'static str,
    pub query: String,
    pub error: ProviderError,
}

/// Everything learned about one item in one pass.
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub item: LookupItem,
    pub metadata: Option<MediaMetadata>,
    /// Providers that answered without error, with or without data.
    pub answered: Vec<ProviderKind>,
    pub errors: Vec<ProviderFailure>,
}

fn build_request(
    item: &LookupItem,
    parent: Option<&MediaMetadata>,
    query: Option<&str>,
) -> LookupRequest {
    let request = LookupRequest::from_item(item).with_query(query);
    match parent {
        Some(p) => request.with_parent(p),
        None => request,
    }
}

/// Ask every provider that handles `item`'s kind, one after another, and
/// merge what comes back.
///
/// Returns `None` if `cancel` fired; partial results are not reported.
pub async fn lookup_item(
    providers: &[Arc<dyn MetadataProvider>],
    policy: &BackoffPolicy,
    item: &LookupItem,
    parent: Option<&MediaMetadata>,
    cancel: &CancellationToken,
) -> Option<LookupResult> {
    let request = build_request(item, parent, None);

    let mut primary = None;
    let mut secondaries = Vec::new();
    let mut answered = Vec::new();
    let mut errors = Vec::new();

    for provider in providers
        .iter()
        .filter(|p| p.capabilities().supports(item.media_kind))
    {
        match fetch_with_backoff(provider.as_ref(), &request, policy, cancel).await {
            Ok(found) => {
                answered.push(provider.kind());
                match found {
                    Some(meta) if provider.kind() == ProviderKind::Primary && primary.is_none() => {
                        primary = Some(meta)
                    }
                    Some(meta) => secondaries.push(meta),
                    None => debug!(provider = provider.name(), item = %item.describe(), "No contribution"),
                }
            }
            Err(ProviderError::Cancelled) => return None,
            Err(error) => {
                if error.is_not_found() {
                    debug!(provider = provider.name(), query = %request.name, "No match");
                } else {
                    warn!(provider = provider.name(), query = %request.name, error = %error, "Lookup failed");
                }
                errors.push(ProviderFailure {
                    provider: provider.kind(),
                    name: provider.name(),
                    query: request.name.clone(),
                    error,
                });
            }
        }
    }

    let mut metadata = merge(item, primary.as_ref(), &secondaries);
    if let (Some(meta), Some(parent)) = (metadata.as_mut(), parent) {
        meta.inherit_show_ids(parent);
    }

    Some(LookupResult {
        item: item.clone(),
        metadata,
        answered,
        errors,
    })
}

/// Single-provider lookup used by manual retries.
///
/// Returns the query actually sent alongside the outcome.
pub async fn fetch_one(
    provider: &dyn MetadataProvider,
    policy: &BackoffPolicy,
    item: &LookupItem,
    query: Option<&str>,
    parent: Option<&MediaMetadata>,
    cancel: &CancellationToken,
) -> (String, Result<Option<MediaMetadata>, ProviderError>) {
    let request = build_request(item, parent, query);
    let result = fetch_with_backoff(provider, &request, policy, cancel).await;
    let result = result.map(|found| {
        found.map(|mut meta| {
            if let Some(parent) = parent {
                meta.inherit_show_ids(parent);
            }
            meta
        })
    });
    (request.name, result)
}

//! Rate-limit backoff around a single provider call.

use std::time::Duration;

use reelname_common::ProviderError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::provider::{LookupRequest, MetadataProvider};
use super::record::MediaMetadata;

/// Largest shift applied to the backoff unit.
const MAX_SHIFT: u32 = 4;

/// Exponential backoff schedule: attempt `n` waits `unit * (2 << min(n, 4))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub unit: Duration,
    /// Rate-limited calls retried before giving up.
    pub max_escalations: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(1),
            max_escalations: 5,
        }
    }
}

impl BackoffPolicy {
    pub fn new(unit: Duration, max_escalations: u32) -> Self {
        Self {
            unit,
            max_escalations,
        }
    }

    /// Wait before retry number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.unit * (2u32 << attempt.min(MAX_SHIFT))
    }

    /// Sum of every wait when all escalations are used.
    pub fn total(&self) -> Duration {
        (0..self.max_escalations).map(|i| self.delay(i)).sum()
    }
}

/// Call `provider`, sleeping and retrying while it reports rate limiting.
///
/// A server-sent `Retry-After` longer than the scheduled wait is honored.
/// Once `max_escalations` waits have been spent the next rate limit becomes
/// [`ProviderError::Exhausted`]. Cancellation aborts both the call and any
/// pending wait with [`ProviderError::Cancelled`].
pub async fn fetch_with_backoff(
    provider: &dyn MetadataProvider,
    request: &LookupRequest,
    policy: &BackoffPolicy,
    cancel: &CancellationToken,
) -> Result<Option<MediaMetadata>, ProviderError> {
    let mut attempt = 0u32;
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            r = provider.fetch(request, cancel) => r,
        };

        let retry_after = match result {
            Err(ProviderError::RateLimited { retry_after }) => retry_after,
            other => return other,
        };

        if attempt >= policy.max_escalations {
            warn!(
                provider = provider.name(),
                query = %request.name,
                attempts = attempt + 1,
                "Rate limit persisted, giving up"
            );
            return Err(ProviderError::Exhausted {
                attempts: attempt + 1,
            });
        }

        let wait = policy.delay(attempt).max(retry_after.unwrap_or_default());
        warn!(
            provider = provider.name(),
            query = %request.name,
            attempt = attempt + 1,
            wait_ms = wait.as_millis() as u64,
            "Rate limited, backing off"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            _ = tokio::time::sleep(wait) => {}
        }
        attempt += 1;
    }
}

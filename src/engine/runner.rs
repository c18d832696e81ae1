//! Strictly sequential phase execution.

use std::sync::Arc;

use reelname_common::Phase;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::pool::run_phase;
use super::EngineInner;
use crate::scanner::LookupItem;

/// Run titles, then seasons, then episodes. The final progress event is
/// always delivered, flagged `canceled` if `cancel` fired before the last
/// phase finished.
pub(crate) async fn run_phases(inner: Arc<EngineInner>, cancel: CancellationToken) {
    let mut canceled = false;

    for phase in Phase::ALL {
        if cancel.is_cancelled() {
            canceled = true;
            break;
        }

        let items: Vec<LookupItem> = inner
            .items
            .iter()
            .filter(|item| item.phase == phase)
            .cloned()
            .collect();
        if items.is_empty() {
            debug!(phase = phase.name(), "No items, skipping phase");
            continue;
        }

        info!(phase = phase.name(), items = items.len(), "Starting phase");
        inner.progress.update(|s| {
            s.phase_index = phase.index();
            s.phase_name = phase.name().to_string();
        });
        inner.progress.emit(&cancel, None).await;

        run_phase(&inner, phase, items, &cancel).await;

        if cancel.is_cancelled() {
            canceled = true;
            break;
        }
        info!(phase = phase.name(), "Phase complete");
    }

    let summary = inner.progress.finish(canceled);
    info!(
        processed = summary.processed_items,
        total = summary.total_items,
        errors = summary.error_count,
        canceled,
        "Lookup run finished"
    );
}

//! Bounded worker pool for a single phase.
//!
//! A dispatcher feeds a bounded work queue, `n` workers pull from it and
//! push results to a coordinator, which is the only writer of shared run
//! state. [`run_phase`] returns once every result has been recorded, so the
//! next phase always sees a complete cache.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use reelname_common::Phase;

use super::lookup::{lookup_item, LookupResult};
use super::{EngineInner, TerminalError};
use crate::scanner::LookupItem;

/// Run every item of `phase` through the pool.
pub(crate) async fn run_phase(
    inner: &Arc<EngineInner>,
    phase: Phase,
    items: Vec<LookupItem>,
    cancel: &CancellationToken,
) {
    let worker_count = inner.options.worker_limit.min(items.len());
    if worker_count == 0 {
        return;
    }

    let (work_tx, work_rx) = mpsc::channel::<LookupItem>(worker_count);
    let work_rx = Arc::new(Mutex::new(work_rx));
    let (result_tx, mut result_rx) = mpsc::channel::<LookupResult>(worker_count);

    let mut workers = JoinSet::new();
    for worker_id in 0..worker_count {
        let inner = Arc::clone(inner);
        let work_rx = Arc::clone(&work_rx);
        let result_tx = result_tx.clone();
        let cancel = cancel.clone();
        workers.spawn(async move {
            run_worker(worker_id, inner, work_rx, result_tx, cancel).await;
        });
    }
    drop(result_tx);

    debug!(phase = %phase.name(), workers = worker_count, "Worker pool started");

    let dispatcher = dispatch(inner, items, work_tx, cancel);
    let coordinator = async {
        while let Some(result) = result_rx.recv().await {
            record_result(inner, result, cancel).await;
        }
    };
    tokio::join!(dispatcher, coordinator);

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!("Lookup worker panicked: {}", e);
        }
    }
}

/// Queue each item not already resolved. Cache hits and repeated keys are
/// counted as processed without a fetch.
async fn dispatch(
    inner: &EngineInner,
    items: Vec<LookupItem>,
    work_tx: mpsc::Sender<LookupItem>,
    cancel: &CancellationToken,
) {
    let mut seen = HashSet::new();
    for item in items {
        if cancel.is_cancelled() {
            break;
        }

        if !seen.insert(item.key.clone()) || inner.cache.contains(&item.key) {
            debug!(key = %item.key, "Already resolved, skipping fetch");
            inner.progress.update(|s| {
                s.processed_items += 1;
                s.last_item = Some(item.describe());
            });
            inner.progress.emit(cancel, None).await;
            continue;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = work_tx.send(item) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

async fn run_worker(
    worker_id: usize,
    inner: Arc<EngineInner>,
    work_rx: Arc<Mutex<mpsc::Receiver<LookupItem>>>,
    result_tx: mpsc::Sender<LookupResult>,
    cancel: CancellationToken,
) {
    loop {
        let next = {
            let mut rx = work_rx.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = rx.recv() => item,
            }
        };
        let Some(item) = next else {
            break;
        };

        inner.progress.update(|s| s.active_workers += 1);

        let parent = item
            .parent_key
            .as_deref()
            .and_then(|key| inner.cache.get(key));
        let result = lookup_item(
            &inner.providers,
            &inner.options.backoff,
            &item,
            parent.as_ref(),
            &cancel,
        )
        .await;

        inner
            .progress
            .update(|s| s.active_workers = s.active_workers.saturating_sub(1));

        let Some(result) = result else {
            debug!(worker = worker_id, key = %item.key, "Lookup cancelled, result discarded");
            break;
        };
        if result_tx.send(result).await.is_err() {
            break;
        }
    }
    debug!(worker = worker_id, "Worker stopped");
}

/// Fold one result into the cache, failure tracker and error list, then
/// publish progress.
async fn record_result(inner: &EngineInner, result: LookupResult, cancel: &CancellationToken) {
    let LookupResult {
        item,
        metadata,
        answered,
        errors,
    } = result;

    if let Some(meta) = metadata {
        inner.cache.set(item.key.clone(), meta);
    }
    for provider in answered {
        inner.failures.resolve(&item.key, provider);
    }

    let mut reported = None;
    for failure in errors {
        if failure.error.is_not_found() {
            inner
                .failures
                .record(&item, failure.provider, &failure.query, &failure.error);
            continue;
        }

        inner.failures.resolve(&item.key, failure.provider);
        let terminal = TerminalError {
            key: item.key.clone(),
            provider: failure.provider,
            provider_name: failure.name.to_string(),
            source: failure.error,
        };
        warn!(key = %terminal.key, provider = %terminal.provider_name, "{}", terminal.source);
        reported = Some(terminal.to_string());
        inner.errors.lock().push(terminal);
    }

    let error_count = inner.error_count();
    let summary = inner.progress.update(|s| {
        s.processed_items += 1;
        s.last_item = Some(item.describe());
        s.error_count = error_count;
    });
    info!(
        item = %item.describe(),
        processed = summary.processed_items,
        total = summary.total_items,
        "Lookup complete"
    );
    inner.progress.emit(cancel, reported).await;
}

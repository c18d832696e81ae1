//! Progress summary and the bounded event stream that carries it.

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::{self, OwnedPermit};
use tokio_util::sync::CancellationToken;

/// Snapshot of an engine run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub total_items: usize,
    pub processed_items: usize,
    pub active_workers: usize,
    pub worker_limit: usize,
    pub phase_index: usize,
    pub phase_name: String,
    pub active_providers: Vec<String>,
    /// Tracked failures plus terminal errors.
    pub error_count: usize,
    pub last_item: Option<String>,
    pub done: bool,
    pub canceled: bool,
}

/// One message on the progress stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub summary: ProgressSummary,
    /// Set when the event reports a terminal provider error.
    pub error: Option<String>,
}

struct Sink {
    tx: mpsc::Sender<ProgressEvent>,
    /// Slot reserved up front for the final event.
    terminal: OwnedPermit<ProgressEvent>,
}

/// Owns the mutable summary and, while a run is active, the event sender.
pub(crate) struct ProgressReporter {
    summary: Mutex<ProgressSummary>,
    sink: Mutex<Option<Sink>>,
}

impl ProgressReporter {
    pub fn new(initial: ProgressSummary) -> Self {
        Self {
            summary: Mutex::new(initial),
            sink: Mutex::new(None),
        }
    }

    /// Open the event stream. One slot of `buffer` is held back for the
    /// final event, so `buffer` is raised to at least 2.
    pub fn attach(&self, buffer: usize) -> Option<mpsc::Receiver<ProgressEvent>> {
        let (tx, rx) = mpsc::channel(buffer.max(2));
        let terminal = tx.clone().try_reserve_owned().ok()?;
        *self.sink.lock() = Some(Sink { tx, terminal });
        Some(rx)
    }

    pub fn update(&self, f: impl FnOnce(&mut ProgressSummary)) -> ProgressSummary {
        let mut summary = self.summary.lock();
        f(&mut summary);
        summary.clone()
    }

    pub fn snapshot(&self) -> ProgressSummary {
        self.summary.lock().clone()
    }

    /// Publish the current summary. Waits for queue space unless `cancel`
    /// fires first, in which case the event is dropped.
    pub async fn emit(&self, cancel: &CancellationToken, error: Option<String>) {
        let tx = match self.sink.lock().as_ref() {
            Some(sink) => sink.tx.clone(),
            None => return,
        };
        let event = ProgressEvent {
            summary: self.snapshot(),
            error,
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            _ = tx.send(event) => {}
        }
    }

    /// Mark the run finished, deliver the final event through the reserved
    /// slot and close the stream.
    pub fn finish(&self, canceled: bool) -> ProgressSummary {
        let summary = self.update(|s| {
            s.done = !canceled;
            s.canceled = canceled;
            s.active_workers = 0;
        });
        if let Some(sink) = self.sink.lock().take() {
            let Sink { tx, terminal } = sink;
            terminal.send(ProgressEvent {
                summary: summary.clone(),
                error: None,
            });
            drop(tx);
        }
        summary
    }
}

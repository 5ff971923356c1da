//! Single-flight execution of searches.
//!
//! A [`SearchSupervisor`] keeps at most one search running. Starting a new
//! search cancels the previous one and waits for its child process to be
//! reaped before the new child is spawned. This is per supervisor, not per
//! caller: concurrent callers sharing a supervisor always let the latest one
//! win.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use super::errors::SearchError;
use super::model::SearchOutcome;
use super::parser::parse_output;
use super::process::ProcessRunner;

struct InFlight {
    id: u64,
    cancel: CancellationToken,
    /// Flips to `true` (or closes) once the search no longer owns a child
    finished: watch::Receiver<bool>,
}

impl InFlight {
    fn is_finished(&self) -> bool {
        *self.finished.borrow() || self.finished.has_changed().is_err()
    }

    async fn wait_finished(&mut self) {
        while !*self.finished.borrow_and_update() {
            if self.finished.changed().await.is_err() {
                break;
            }
        }
    }
}

/// Marks the owning search as finished when dropped, including on early return
/// or when the search future itself is dropped.
struct FinishGuard(watch::Sender<bool>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        let _ = self.0.send(true);
    }
}

/// Owner of the single in-flight search slot.
pub struct SearchSupervisor {
    runner: ProcessRunner,
    slot: Mutex<Option<InFlight>>,
    next_id: AtomicU64,
}

impl Default for SearchSupervisor {
    fn default() -> Self {
        Self::new(ProcessRunner::default())
    }
}

impl SearchSupervisor {
    pub fn new(runner: ProcessRunner) -> Self {
        Self {
            runner,
            slot: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Run `argv` in `cwd`, superseding any search still in flight.
    ///
    /// Returns [`SearchError::Cancelled`] if a later call superseded this one.
    pub async fn run_search(&self, argv: &[String], cwd: &Path) -> Result<SearchOutcome, SearchError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (finished_tx, finished_rx) = watch::channel(false);
        let guard = FinishGuard(finished_tx);

        {
            let mut slot = self.slot.lock().await;
            if let Some(mut previous) = slot.take() {
                if !previous.is_finished() {
                    tracing::debug!(previous = previous.id, next = id, "cancelling superseded search");
                    previous.cancel.cancel();
                    previous.wait_finished().await;
                }
            }
            *slot = Some(InFlight {
                id,
                cancel: cancel.clone(),
                finished: finished_rx,
            });
        }

        let result = self.runner.execute(argv, cwd, &cancel).await;
        // Signal before touching the slot: a successor may hold the lock while
        // waiting for this search to finish
        drop(guard);
        self.release(id).await;

        let output = result?;
        Ok(parse_output(output.code, &output.output, argv))
    }

    /// Whether a search is currently running.
    pub async fn is_busy(&self) -> bool {
        self.slot
            .lock()
            .await
            .as_ref()
            .is_some_and(|in_flight| !in_flight.is_finished())
    }

    /// Cancel the running search, if any, and wait for its process to exit.
    pub async fn cancel_current(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(mut current) = slot.take() {
            current.cancel.cancel();
            current.wait_finished().await;
        }
    }

    async fn release(&self, id: u64) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|in_flight| in_flight.id == id) {
            *slot = None;
        }
    }
}

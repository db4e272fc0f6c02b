//! One live progress feed at a time.
//!
//! Following a job opens its feed on a background task. Following a different
//! job cancels the previous feed before the new one starts, and the new job
//! gets a fresh tracker, so events from the old feed never reach the new state.

use std::sync::Arc;

use clausemap_core::{ContractId, ProgressSnapshot, ProgressTracker, TerminalHook};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::feed::{StreamEnd, consume_progress};
use crate::http::ApiClient;

pub type SharedHook = Arc<dyn TerminalHook + Send + Sync>;

struct ActiveFeed {
    job: ContractId,
    cancel: CancellationToken,
    updates: watch::Receiver<ProgressSnapshot>,
    handle: JoinHandle<()>,
}

pub struct ProgressMonitor {
    client: ApiClient,
    hook: SharedHook,
    active: Option<ActiveFeed>,
}

impl ProgressMonitor {
    pub fn new(client: ApiClient, hook: SharedHook) -> Self {
        Self {
            client,
            hook,
            active: None,
        }
    }

    /// Start (or keep) following `job` and return a receiver for its snapshots.
    ///
    /// The receiver reports closed once the feed task exits, whether the
    /// server ended the feed, the transport failed, or the feed was cancelled.
    /// Must be called inside a tokio runtime.
    pub fn follow(&mut self, job: ContractId) -> watch::Receiver<ProgressSnapshot> {
        if let Some(active) = &self.active
            && active.job == job
            && !active.handle.is_finished()
        {
            return active.updates.clone();
        }
        self.stop();

        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(ProgressSnapshot::default());
        let tracker = ProgressTracker::new(job, Arc::clone(&self.hook));
        let handle = tokio::spawn(run_feed(self.client.clone(), tracker, tx, cancel.clone()));

        self.active = Some(ActiveFeed {
            job,
            cancel,
            updates: rx.clone(),
            handle,
        });
        rx
    }

    /// Cancel the live feed, if any. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(job = active.job, "stopping progress feed");
            active.cancel.cancel();
        }
    }

    pub fn active_job(&self) -> Option<ContractId> {
        self.active.as_ref().map(|a| a.job)
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_feed(
    client: ApiClient,
    mut tracker: ProgressTracker<SharedHook>,
    updates: watch::Sender<ProgressSnapshot>,
    cancel: CancellationToken,
) {
    let job = tracker.job();
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        opened = client.open_progress(job) => opened,
    };
    let response = match opened {
        Ok(response) => response,
        Err(err) => {
            warn!(job, error = %err, "could not open progress feed");
            return;
        }
    };

    match consume_progress(response.bytes_stream(), &mut tracker, &updates, &cancel).await {
        Ok(StreamEnd::Ended { outcome: Some(step) }) => {
            info!(job, step = %step, "progress feed closed")
        }
        Ok(StreamEnd::Ended { outcome: None }) => {
            warn!(job, "progress feed closed before a terminal step")
        }
        Ok(StreamEnd::Cancelled) => debug!(job, "progress feed cancelled"),
        Err(err) => warn!(job, error = %err, "progress feed dropped"),
    }
}

//! Cancellable read loop over a chunked progress feed.
//!
//! The transport is any `Stream` of byte chunks, so the loop runs the same
//! over a live HTTP body and over canned chunks in tests.

use std::pin::pin;

use clausemap_core::{LineDecoder, ProgressSnapshot, ProgressStep, ProgressTracker, TerminalHook};
use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How a feed read loop stopped, when it stopped without a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The server closed the feed. `outcome` is the terminal step observed, if any.
    Ended { outcome: Option<ProgressStep> },
    /// The consumer cancelled; no state was touched after the token fired.
    Cancelled,
}

/// Drive `tracker` from `chunks` until the feed ends, fails, or `cancel` fires.
///
/// Every applied event publishes a fresh snapshot on `updates`. Lines that
/// carry no valid event are skipped. A final line without a trailing newline
/// is still applied once the stream ends. Transport errors are returned as-is
/// and leave the tracker at its last good state.
pub async fn consume_progress<S, B, E, H>(
    chunks: S,
    tracker: &mut ProgressTracker<H>,
    updates: &watch::Sender<ProgressSnapshot>,
    cancel: &CancellationToken,
) -> Result<StreamEnd, E>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    H: TerminalHook,
{
    let mut chunks = pin!(chunks);
    let mut decoder = LineDecoder::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(StreamEnd::Cancelled),
            next = chunks.next() => next,
        };
        let Some(chunk) = next else { break };

        for line in decoder.push(chunk?.as_ref()) {
            if cancel.is_cancelled() {
                return Ok(StreamEnd::Cancelled);
            }
            apply_line(tracker, updates, &line);
        }
    }

    if let Some(line) = decoder.finish()
        && !cancel.is_cancelled()
    {
        apply_line(tracker, updates, &line);
    }

    Ok(StreamEnd::Ended {
        outcome: tracker.outcome(),
    })
}

fn apply_line<H: TerminalHook>(
    tracker: &mut ProgressTracker<H>,
    updates: &watch::Sender<ProgressSnapshot>,
    line: &str,
) {
    if line.is_empty() {
        return;
    }
    match tracker.apply_line(line) {
        Some(_) => {
            updates.send_replace(tracker.snapshot());
        }
        None => debug!(job = tracker.job(), line, "ignoring feed line"),
    }
}

/// Report every published snapshot to `on_update` until the job is terminal
/// or the feed task goes away, and return the last snapshot seen.
pub async fn watch_until_terminal<F>(
    mut updates: watch::Receiver<ProgressSnapshot>,
    mut on_update: F,
) -> ProgressSnapshot
where
    F: FnMut(&ProgressSnapshot),
{
    loop {
        let snapshot = updates.borrow_and_update().clone();
        if snapshot.event.is_some() {
            on_update(&snapshot);
        }
        if snapshot.terminal || updates.changed().await.is_err() {
            return snapshot;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clausemap_core::ContractId;
    use futures::stream;
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(ContractId, ProgressStep)>>>);

    impl TerminalHook for Recorder {
        fn on_terminal(&self, job: ContractId, step: ProgressStep) {
            self.0.lock().unwrap().push((job, step));
        }
    }

    fn event(step: &str, current: u32) -> String {
        format!("data:{{\"step\":\"{step}\",\"message\":\"{step} step\",\"current\":{current},\"total\":4}}\n\n")
    }

    fn chunks(parts: Vec<String>) -> impl Stream<Item = Result<Vec<u8>, Infallible>> {
        stream::iter(parts.into_iter().map(|p| Ok(p.into_bytes())))
    }

    #[tokio::test]
    async fn full_pipeline_fires_hook_once() {
        let hook = Recorder::default();
        let mut tracker = ProgressTracker::new(11, hook.clone());
        let (tx, rx) = watch::channel(ProgressSnapshot::default());
        let cancel = CancellationToken::new();

        let feed = chunks(vec![
            event("EXTRACTING", 0),
            event("CHUNKING", 0),
            event("ANALYZING", 2),
            event("EVALUATING", 4),
            event("COMPLETED", 4),
            event("COMPLETED", 4),
        ]);
        let end = consume_progress(feed, &mut tracker, &tx, &cancel).await.unwrap();

        assert_eq!(
            end,
            StreamEnd::Ended {
                outcome: Some(ProgressStep::Completed)
            }
        );
        assert_eq!(*hook.0.lock().unwrap(), vec![(11, ProgressStep::Completed)]);
        let snapshot = rx.borrow().clone();
        assert!(snapshot.terminal);
        assert_eq!(snapshot.step(), Some(ProgressStep::Completed));
    }

    #[tokio::test]
    async fn lines_split_across_chunks_are_reassembled() {
        let text = format!("{}{}", event("ANALYZING", 1), event("FAILED", 0));
        let parts: Vec<String> = text.chars().map(String::from).collect();

        let hook = Recorder::default();
        let mut tracker = ProgressTracker::new(2, hook.clone());
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());
        let end = consume_progress(chunks(parts), &mut tracker, &tx, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            end,
            StreamEnd::Ended {
                outcome: Some(ProgressStep::Failed)
            }
        );
        assert_eq!(*hook.0.lock().unwrap(), vec![(2, ProgressStep::Failed)]);
    }

    #[tokio::test]
    async fn noise_and_malformed_lines_are_skipped() {
        let feed = chunks(vec![
            ": keep-alive\n".into(),
            "event:progress\n".into(),
            "data:{broken\n".into(),
            "data:{\"step\":\"UNKNOWN\"}\n".into(),
            event("CHUNKING", 0),
        ]);
        let mut tracker = ProgressTracker::new(1, Recorder::default());
        let (tx, rx) = watch::channel(ProgressSnapshot::default());
        let end = consume_progress(feed, &mut tracker, &tx, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(end, StreamEnd::Ended { outcome: None });
        assert_eq!(rx.borrow().step(), Some(ProgressStep::Chunking));
        assert!(!rx.borrow().terminal);
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_applied() {
        let feed = chunks(vec![
            event("EVALUATING", 4),
            r#"data:{"step":"COMPLETED","current":4,"total":4}"#.into(),
        ]);
        let hook = Recorder::default();
        let mut tracker = ProgressTracker::new(5, hook.clone());
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());
        consume_progress(feed, &mut tracker, &tx, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(tracker.outcome(), Some(ProgressStep::Completed));
        assert_eq!(hook.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_before_first_chunk_touches_nothing() {
        let hook = Recorder::default();
        let mut tracker = ProgressTracker::new(9, hook.clone());
        let (tx, rx) = watch::channel(ProgressSnapshot::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let end = consume_progress(chunks(vec![event("COMPLETED", 4)]), &mut tracker, &tx, &cancel)
            .await
            .unwrap();

        assert_eq!(end, StreamEnd::Cancelled);
        assert!(hook.0.lock().unwrap().is_empty());
        assert_eq!(*rx.borrow(), ProgressSnapshot::default());
    }

    #[tokio::test]
    async fn cancel_while_waiting_for_next_chunk() {
        let feed = chunks(vec![event("EXTRACTING", 0)]).chain(stream::pending());
        let hook = Recorder::default();
        let mut tracker = ProgressTracker::new(4, hook.clone());
        let (tx, mut rx) = watch::channel(ProgressSnapshot::default());
        let cancel = CancellationToken::new();

        let (end, ()) = tokio::join!(consume_progress(feed, &mut tracker, &tx, &cancel), async {
            rx.changed().await.unwrap();
            cancel.cancel();
        });

        assert_eq!(end.unwrap(), StreamEnd::Cancelled);
        assert_eq!(tracker.state(), Some(ProgressStep::Extracting));
        assert!(hook.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_error_is_returned() {
        let feed = stream::iter(vec![
            Ok(event("ANALYZING", 1).into_bytes()),
            Err("connection reset"),
            Ok(event("COMPLETED", 4).into_bytes()),
        ]);
        let hook = Recorder::default();
        let mut tracker = ProgressTracker::new(6, hook.clone());
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());

        let err = consume_progress(feed, &mut tracker, &tx, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, "connection reset");
        assert_eq!(tracker.state(), Some(ProgressStep::Analyzing));
        assert!(hook.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn watcher_stops_at_terminal_snapshot() {
        let (tx, rx) = watch::channel(ProgressSnapshot::default());
        let mut tracker = ProgressTracker::new(1, Recorder::default());
        let feed = chunks(vec![event("ANALYZING", 1), event("COMPLETED", 4)]);

        let mut seen = Vec::new();
        let cancel = CancellationToken::new();
        let (end, last) = tokio::join!(
            consume_progress(feed, &mut tracker, &tx, &cancel),
            watch_until_terminal(rx, |s| seen.push(s.step()))
        );

        end.unwrap();
        assert!(last.terminal);
        assert_eq!(seen.last(), Some(&Some(ProgressStep::Completed)));
    }

    #[tokio::test]
    async fn watcher_returns_when_feed_goes_away() {
        let (tx, rx) = watch::channel(ProgressSnapshot::default());
        let mut tracker = ProgressTracker::new(1, Recorder::default());
        consume_progress(chunks(vec![event("CHUNKING", 0)]), &mut tracker, &tx, &CancellationToken::new())
            .await
            .unwrap();
        drop(tx);

        let last = watch_until_terminal(rx, |_| {}).await;
        assert!(!last.terminal);
        assert_eq!(last.step(), Some(ProgressStep::Chunking));
    }
}

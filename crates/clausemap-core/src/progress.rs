//! Analysis progress: event types, feed line decoding, and the per-job state machine.
//!
//! The contract service pushes progress as a text feed. Each line starting with
//! [`PROGRESS_MARKER`] carries one JSON [`ProgressEvent`]; every other line is
//! ignored. [`LineDecoder`] turns arbitrary byte chunks into complete lines and
//! [`ProgressTracker`] folds the parsed events into the current state, firing
//! its [`TerminalHook`] once when the job completes or fails.
//!
//! Nothing here does I/O; the streaming read loop lives in `clausemap-sync`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::finding::{ContractId, ContractStatus};

/// Prefix of feed lines that carry a progress payload.
pub const PROGRESS_MARKER: &str = "data:";

/// One phase of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProgressStep {
    Extracting,
    Chunking,
    Analyzing,
    Evaluating,
    Completed,
    Failed,
}

impl ProgressStep {
    /// The normal forward sequence of a successful job.
    pub const PIPELINE: [ProgressStep; 5] = [
        Self::Extracting,
        Self::Chunking,
        Self::Analyzing,
        Self::Evaluating,
        Self::Completed,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Index in [`PIPELINE`](Self::PIPELINE); `None` for `Failed`.
    pub fn position(self) -> Option<usize> {
        Self::PIPELINE.iter().position(|&s| s == self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extracting => "EXTRACTING",
            Self::Chunking => "CHUNKING",
            Self::Analyzing => "ANALYZING",
            Self::Evaluating => "EVALUATING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Extracting => "Extracting text",
            Self::Chunking => "Splitting into chunks",
            Self::Analyzing => "Comparing against regulations",
            Self::Evaluating => "Evaluating risk",
            Self::Completed => "Analysis complete",
            Self::Failed => "Analysis failed",
        }
    }
}

impl fmt::Display for ProgressStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A single progress report from the analysis job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub step: ProgressStep,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub current: u32,
    #[serde(default)]
    pub total: u32,
}

impl ProgressEvent {
    pub fn new(step: ProgressStep, message: impl Into<String>, current: u32, total: u32) -> Self {
        Self {
            step,
            message: message.into(),
            current,
            total,
        }
    }
}

/// Parse one complete feed line.
///
/// Returns `None` for lines without the marker and for payloads that are not
/// a valid event. Neither is an error: the feed carries other SSE fields
/// (`event:`, `id:`, blank separators) that are meant to be skipped.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let payload = line.strip_prefix(PROGRESS_MARKER)?;
    match serde_json::from_str(payload.trim()) {
        Ok(event) => Some(event),
        Err(err) => {
            debug!(error = %err, "skipping malformed progress payload");
            None
        }
    }
}

/// Incremental splitter from byte chunks to text lines.
///
/// Bytes after the last newline are held until the next chunk, so a line (or
/// a multi-byte character) split across chunks is reassembled before decoding.
/// A trailing `\r` is stripped from each line.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let scan_from = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut line_start = 0;
        let mut search = scan_from;
        while let Some(offset) = self.pending[search..].iter().position(|&b| b == b'\n') {
            let line_end = search + offset;
            lines.push(decode_line(&self.pending[line_start..line_end]));
            line_start = line_end + 1;
            search = line_start;
        }
        self.pending.drain(..line_start);

        lines
    }

    /// Flush whatever is buffered once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = decode_line(&self.pending);
        self.pending.clear();
        Some(line)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Side effect run once per job when it reaches a terminal step.
///
/// Implementations typically invalidate cached finding lists and contract
/// status so the next read refetches them.
pub trait TerminalHook {
    fn on_terminal(&self, job: ContractId, step: ProgressStep);
}

impl<T: TerminalHook + ?Sized> TerminalHook for Arc<T> {
    fn on_terminal(&self, job: ContractId, step: ProgressStep) {
        (**self).on_terminal(job, step)
    }
}

/// Consumer-facing progress state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Latest event received; `None` before the first one.
    pub event: Option<ProgressEvent>,
    /// Set once a terminal step has been observed, never cleared.
    pub terminal: bool,
}

impl ProgressSnapshot {
    pub fn step(&self) -> Option<ProgressStep> {
        self.event.as_ref().map(|e| e.step)
    }
}

/// What applying one event did to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State moved; no terminal step reached yet.
    Progressed,
    /// First terminal step; the hook has just run.
    Terminated(ProgressStep),
    /// Event arrived after the job was already terminal.
    AfterTerminal,
}

/// Progress state machine for one analysis job.
///
/// Records the most recent event as current state without checking that steps
/// move forward. The first `Completed` or `Failed` fires the hook; later events
/// still update the displayed message and counters but never fire it again.
pub struct ProgressTracker<H> {
    job: ContractId,
    hook: H,
    current: Option<ProgressEvent>,
    terminal: Option<ProgressStep>,
}

impl<H: TerminalHook> ProgressTracker<H> {
    pub fn new(job: ContractId, hook: H) -> Self {
        Self {
            job,
            hook,
            current: None,
            terminal: None,
        }
    }

    pub fn apply(&mut self, event: ProgressEvent) -> Transition {
        let step = event.step;
        self.current = Some(event);

        if self.terminal.is_some() {
            return Transition::AfterTerminal;
        }
        if step.is_terminal() {
            self.terminal = Some(step);
            info!(job = self.job, step = %step, "analysis reached terminal step");
            self.hook.on_terminal(self.job, step);
            return Transition::Terminated(step);
        }
        debug!(job = self.job, step = %step, "analysis progressed");
        Transition::Progressed
    }

    /// Parse `line` and apply it if it carries an event.
    pub fn apply_line(&mut self, line: &str) -> Option<Transition> {
        parse_progress_line(line).map(|event| self.apply(event))
    }

    pub fn job(&self) -> ContractId {
        self.job
    }

    pub fn current(&self) -> Option<&ProgressEvent> {
        self.current.as_ref()
    }

    /// Current step, or `None` before any event.
    pub fn state(&self) -> Option<ProgressStep> {
        self.current.as_ref().map(|e| e.step)
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    /// The terminal step that fired the hook, if any.
    pub fn outcome(&self) -> Option<ProgressStep> {
        self.terminal
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            event: self.current.clone(),
            terminal: self.terminal.is_some(),
        }
    }
}

/// Whether findings for a contract may be fetched yet.
///
/// Fetching is held back only while the job is still analyzing and no
/// terminal event has been seen.
pub fn should_fetch_findings(status: ContractStatus, terminal_reached: bool) -> bool {
    status != ContractStatus::Analyzing || terminal_reached
}

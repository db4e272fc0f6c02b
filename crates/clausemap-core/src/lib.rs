//! Core types, clause-to-document alignment, and analysis progress tracking.

pub mod align;
pub mod finding;
pub mod heatmap;
pub mod locate;
pub mod progress;
pub mod resolve;
pub mod segment;
pub mod span;

pub use align::{Alignment, Unplaced, UnplacedReason, align};
pub use finding::{
    Contract, ContractId, ContractStatus, Finding, FindingDetail, FindingId, ParseError, Severity,
};
pub use heatmap::{HeatMarker, project};
pub use locate::{Located, extract_words, locate, locate_start};
pub use progress::{
    LineDecoder, ProgressEvent, ProgressSnapshot, ProgressStep, ProgressTracker, TerminalHook,
    Transition, parse_progress_line, should_fetch_findings,
};
pub use resolve::{Shadowed, resolve, resolve_with_losers};
pub use segment::build_segments;
pub use span::{Match, Segment, Span};

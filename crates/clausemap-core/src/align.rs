//! End-to-end alignment of a finding set onto a document.
//!
//! Runs [`locate`] per finding, [`resolve_with_losers`] over the hits and
//! [`build_segments`] over the survivors. Every input finding ends up either
//! anchored to exactly one annotated segment or listed in
//! [`Alignment::unplaced`] with the reason it is not shown inline.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::finding::{Finding, FindingId};
use crate::locate::{Located, locate};
use crate::resolve::resolve_with_losers;
use crate::segment::build_segments;
use crate::span::{Match, Segment};

/// Why a finding has no annotated segment of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnplacedReason {
    /// The clause could not be located in the document.
    NotFound,
    /// The clause was located but overlapped a finding that won resolution.
    Shadowed { by: FindingId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Unplaced<'a> {
    pub finding: &'a Finding,
    pub reason: UnplacedReason,
}

/// Rendering-path view of one document and its findings.
#[derive(Debug, Clone, Serialize)]
pub struct Alignment<'a> {
    /// Gapless, ordered partition of the document.
    pub segments: Vec<Segment<'a>>,
    /// Finding id to the index of its annotated segment in `segments`.
    pub anchors: BTreeMap<FindingId, usize>,
    /// Findings shown inline nowhere, in input order.
    pub unplaced: Vec<Unplaced<'a>>,
    /// Locator outcome for every finding, in input order.
    #[serde(skip)]
    pub located: Vec<(&'a Finding, Located)>,
}

impl<'a> Alignment<'a> {
    /// The annotated segment rendered for `id`, if any.
    pub fn segment_for(&self, id: FindingId) -> Option<&Segment<'a>> {
        self.anchors.get(&id).map(|&idx| &self.segments[idx])
    }

    /// Findings that need to be listed outside the document view.
    pub fn unmatched(&self) -> impl Iterator<Item = &'a Finding> + '_ {
        self.unplaced.iter().map(|u| u.finding)
    }

    pub fn annotated_count(&self) -> usize {
        self.anchors.len()
    }

    /// `true` if `id` was placed by the approximate pass.
    pub fn is_approximate(&self, id: FindingId) -> bool {
        self.located
            .iter()
            .any(|(f, located)| f.id == id && matches!(located, Located::Approximate(_)))
    }
}

/// Align `findings` onto `document`.
///
/// Pure and deterministic: the same inputs always give the same alignment.
pub fn align<'a>(document: &'a str, findings: &'a [Finding]) -> Alignment<'a> {
    let located: Vec<(&'a Finding, Located)> = findings
        .iter()
        .map(|finding| (finding, locate(document, &finding.clause)))
        .collect();

    let candidates: Vec<Match<'a>> = located
        .iter()
        .filter_map(|&(finding, loc)| loc.span().map(|span| Match::new(span, finding)))
        .collect();

    let (resolved, losers) = resolve_with_losers(candidates);
    let segments = build_segments(document, &resolved);

    let anchors: BTreeMap<FindingId, usize> = segments
        .iter()
        .enumerate()
        .filter_map(|(idx, seg)| seg.finding.map(|f| (f.id, idx)))
        .collect();

    let mut shadowed_by: BTreeMap<FindingId, FindingId> = BTreeMap::new();
    for loser in &losers {
        shadowed_by.insert(loser.lost.finding.id, loser.winner.finding.id);
    }

    let unplaced: Vec<Unplaced<'a>> = located
        .iter()
        .filter(|(finding, _)| !anchors.contains_key(&finding.id))
        .map(|&(finding, loc)| {
            let reason = match loc {
                Located::NotFound => UnplacedReason::NotFound,
                Located::Exact(_) | Located::Approximate(_) => {
                    let by = shadowed_by.get(&finding.id).copied();
                    debug_assert!(
                        by.is_some(),
                        "finding {} was located but is neither anchored nor shadowed",
                        finding.id
                    );
                    by.map_or(UnplacedReason::NotFound, |by| UnplacedReason::Shadowed { by })
                }
            };
            Unplaced { finding, reason }
        })
        .collect();

    debug!(
        findings = findings.len(),
        annotated = anchors.len(),
        unplaced = unplaced.len(),
        "aligned findings"
    );

    Alignment {
        segments,
        anchors,
        unplaced,
        located,
    }
}

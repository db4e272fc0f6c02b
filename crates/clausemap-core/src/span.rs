//! Offsets into a document and the values built on top of them.

use serde::Serialize;

use crate::finding::Finding;

/// Half-open byte range `[start, end)` into a document.
///
/// Both ends always fall on UTF-8 char boundaries, so `&document[span.range()]`
/// never panics for the document the span was located in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} past end {end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A finding paired with where its clause sits in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Match<'a> {
    pub span: Span,
    pub finding: &'a Finding,
}

impl<'a> Match<'a> {
    pub fn new(span: Span, finding: &'a Finding) -> Self {
        Self { span, finding }
    }
}

/// A contiguous run of document text, optionally annotated with one finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub finding: Option<&'a Finding>,
}

impl<'a> Segment<'a> {
    pub fn plain(text: &'a str) -> Self {
        Self {
            text,
            finding: None,
        }
    }

    pub fn annotated(text: &'a str, finding: &'a Finding) -> Self {
        Self {
            text,
            finding: Some(finding),
        }
    }

    pub fn is_annotated(&self) -> bool {
        self.finding.is_some()
    }
}

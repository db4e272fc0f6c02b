//! Partition a document into plain and annotated segments.

use crate::span::{Match, Segment};

/// Walk `resolved` in order and cut `document` into a gapless segment list.
///
/// `resolved` must be sorted by start and non-overlapping, as produced by
/// [`resolve`](crate::resolve::resolve). Concatenating the returned texts
/// always reproduces `document`. An empty match list (or empty document)
/// yields one plain segment holding the whole document.
pub fn build_segments<'a>(document: &'a str, resolved: &[Match<'a>]) -> Vec<Segment<'a>> {
    if document.is_empty() || resolved.is_empty() {
        return vec![Segment::plain(document)];
    }

    let mut segments = Vec::with_capacity(resolved.len() * 2 + 1);
    let mut cursor = 0;

    for m in resolved {
        debug_assert!(
            m.span.start >= cursor && m.span.end <= document.len(),
            "span {:?} out of order or out of range",
            m.span
        );
        if m.span.start > cursor {
            segments.push(Segment::plain(&document[cursor..m.span.start]));
        }
        segments.push(Segment::annotated(&document[m.span.range()], m.finding));
        cursor = m.span.end;
    }

    if cursor < document.len() {
        segments.push(Segment::plain(&document[cursor..]));
    }

    segments
}

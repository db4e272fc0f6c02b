//! Overlap resolution between located findings.

use crate::span::Match;

/// Reduce `matches` to a non-overlapping list sorted by span start.
///
/// Candidates are scanned in start order against the last accepted match. On
/// overlap the candidate replaces it only if its severity strictly outranks
/// the accepted one; equal severities keep whichever came first in the
/// document. Use [`resolve_with_losers`] to learn what was dropped.
pub fn resolve<'a>(matches: Vec<Match<'a>>) -> Vec<Match<'a>> {
    resolve_with_losers(matches).0
}

/// A match dropped during resolution and the match that displaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shadowed<'a> {
    pub lost: Match<'a>,
    pub winner: Match<'a>,
}

/// Like [`resolve`], also returning every dropped match with its winner.
///
/// The winner recorded for a match replaced later in the scan is the match
/// that replaced it, which may itself be dropped afterwards.
pub fn resolve_with_losers<'a>(mut matches: Vec<Match<'a>>) -> (Vec<Match<'a>>, Vec<Shadowed<'a>>) {
    // Stable sort: equal starts keep input order.
    matches.sort_by_key(|m| m.span.start);

    let mut resolved: Vec<Match<'a>> = Vec::with_capacity(matches.len());
    let mut losers = Vec::new();

    for candidate in matches {
        match resolved.last_mut() {
            Some(last) if candidate.span.start < last.span.end => {
                if candidate.finding.severity.outranks(last.finding.severity) {
                    let lost = std::mem::replace(last, candidate);
                    losers.push(Shadowed {
                        lost,
                        winner: candidate,
                    });
                } else {
                    losers.push(Shadowed {
                        lost: candidate,
                        winner: *last,
                    });
                }
            }
            _ => resolved.push(candidate),
        }
    }

    (resolved, losers)
}

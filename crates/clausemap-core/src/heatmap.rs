//! Position-only projection of findings along a document.

use serde::Serialize;

use crate::finding::{Finding, FindingId, Severity};
use crate::locate::locate_start;

/// Where one finding starts, as a fraction of the document length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatMarker {
    pub finding_id: FindingId,
    /// Start offset divided by document length, in characters. Always in `[0, 1)`.
    pub position: f64,
    pub severity: Severity,
}

/// Project every locatable finding onto `[0, 1)`.
///
/// Runs independently of overlap resolution: findings whose spans were
/// shadowed when rendering still get a marker. Findings that cannot be
/// located are left out. Output follows the input order of `findings`.
pub fn project(document: &str, findings: &[Finding]) -> Vec<HeatMarker> {
    if document.is_empty() {
        return Vec::new();
    }
    let total_chars = document.chars().count() as f64;

    findings
        .iter()
        .filter_map(|finding| {
            let start = locate_start(document, &finding.clause)?;
            let before = document[..start].chars().count() as f64;
            Some(HeatMarker {
                finding_id: finding.id,
                position: before / total_chars,
                severity: finding.severity,
            })
        })
        .collect()
}

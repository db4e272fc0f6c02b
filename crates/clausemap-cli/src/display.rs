//! Terminal rendering for contracts, aligned findings, heatmaps, and progress.
//!
//! Annotated segments are printed inline as `[LEVEL #id ...]` so the document
//! reads top to bottom with every placed finding at its clause.

use chrono::NaiveDateTime;
use clausemap_core::{
    Alignment, Contract, FindingDetail, HeatMarker, ProgressSnapshot, ProgressStep, Severity,
    UnplacedReason,
};
use clausemap_sync::Reanalysis;

const MAX_LIST_ITEMS: usize = 10;
const CLAUSE_PREVIEW_CHARS: usize = 60;

// ── Public API ──

/// Print the header card for a contract.
pub fn print_contract_card(contract: &Contract) {
    println!("=== {} ===", contract.filename);
    println!("  {:<12} {}", "id", contract.id);
    println!("  {:<12} {:?}", "status", contract.status);
    if let Some(created) = contract.created_at {
        println!("  {:<12} {}", "created", format_timestamp(created));
    }
    println!("  {:<12} {} chars", "length", contract.content.chars().count());
    println!();
}

/// Print the document with placed findings marked inline, then the findings
/// that could not be shown inline.
pub fn print_alignment(alignment: &Alignment<'_>) {
    println!("{}", render_inline(alignment));
    println!();

    let total = alignment.annotated_count() + alignment.unplaced.len();
    println!("Findings  {} placed / {} total", alignment.annotated_count(), total);
    println!("          {}", severity_tally(alignment));

    if alignment.unplaced.is_empty() {
        return;
    }
    println!("Not shown inline ({}):", alignment.unplaced.len());
    let show = alignment.unplaced.len().min(MAX_LIST_ITEMS);
    for unplaced in &alignment.unplaced[..show] {
        let f = unplaced.finding;
        let why = match unplaced.reason {
            UnplacedReason::NotFound => "not found in text".to_string(),
            UnplacedReason::Shadowed { by } => format!("overlaps #{by}"),
        };
        println!("    #{:<6} {:<6}  {:<20}  {}", f.id, f.severity, why, preview(&f.clause));
    }
    if alignment.unplaced.len() > MAX_LIST_ITEMS {
        println!("    ... and {} more", alignment.unplaced.len() - MAX_LIST_ITEMS);
    }
}

/// Print a one-line heatmap bar followed by the marker list.
pub fn print_heatmap(markers: &[HeatMarker], width: usize) {
    println!("|{}|", heatmap_bar(markers, width));
    for marker in markers.iter().take(MAX_LIST_ITEMS) {
        println!(
            "    #{:<6} {:<6}  at {:>5.1}%",
            marker.finding_id,
            marker.severity,
            marker.position * 100.0
        );
    }
    if markers.len() > MAX_LIST_ITEMS {
        println!("    ... and {} more", markers.len() - MAX_LIST_ITEMS);
    }
}

/// Print reason and suggestion for one finding.
pub fn print_finding_detail(detail: &FindingDetail) {
    println!("=== Finding #{} ({}) ===", detail.id, detail.severity);
    println!("{}", detail.clause);
    println!();
    println!("Reason");
    println!("  {}", detail.reason);
    if let Some(suggestion) = detail.suggestion.as_deref().filter(|s| !s.is_empty()) {
        println!("Suggestion");
        println!("  {suggestion}");
    }
}

// ── Formatting ──

pub fn render_inline(alignment: &Alignment<'_>) -> String {
    let mut out = String::new();
    for segment in &alignment.segments {
        match segment.finding {
            Some(f) => {
                out.push_str(&format!("[{} #{} ", f.severity, f.id));
                out.push_str(segment.text);
                out.push(']');
            }
            None => out.push_str(segment.text),
        }
    }
    out
}

/// One cell per `1 / width` of the document; the most severe marker in a
/// cell decides its glyph.
pub fn heatmap_bar(markers: &[HeatMarker], width: usize) -> String {
    let mut cells: Vec<Option<Severity>> = vec![None; width];
    for marker in markers {
        let Some(cell) = cells.get_mut(cell_index(marker.position, width)) else {
            continue;
        };
        *cell = Some(match *cell {
            Some(current) if !marker.severity.outranks(current) => current,
            _ => marker.severity,
        });
    }
    cells
        .into_iter()
        .map(|cell| match cell {
            Some(Severity::High) => 'H',
            Some(Severity::Medium) => 'M',
            Some(Severity::Low) => 'L',
            None => '.',
        })
        .collect()
}

/// Per-severity counts over every finding, placed or not.
fn severity_tally(alignment: &Alignment<'_>) -> String {
    let (mut high, mut medium, mut low) = (0, 0, 0);
    for (finding, _) in &alignment.located {
        match finding.severity {
            Severity::High => high += 1,
            Severity::Medium => medium += 1,
            Severity::Low => low += 1,
        }
    }
    format!("HIGH {high}  MEDIUM {medium}  LOW {low}")
}

fn cell_index(position: f64, width: usize) -> usize {
    ((position * width as f64) as usize).min(width.saturating_sub(1))
}

/// Single status line for a progress snapshot.
pub fn progress_line(snapshot: &ProgressSnapshot) -> String {
    let Some(event) = &snapshot.event else {
        return "waiting for analysis to start".to_string();
    };
    let stage = match event.step.position() {
        Some(idx) => format!("[{}/{}]", idx + 1, ProgressStep::PIPELINE.len()),
        None => "[x]".to_string(),
    };
    let mut line = format!("{stage} {}", event.step.label());
    if !event.message.is_empty() {
        line.push_str(&format!("  {}", event.message));
    }
    if event.total > 0 {
        let pct = u64::from(event.current) * 100 / u64::from(event.total);
        line.push_str(&format!(" ({}/{}, {pct}%)", event.current, event.total));
    }
    line
}

pub fn reanalysis_line(ack: &Reanalysis) -> String {
    let mut line = format!("contract {} is {:?}", ack.id, ack.status);
    if !ack.message.is_empty() {
        line.push_str(&format!(": {}", ack.message));
    }
    line
}

fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

fn preview(clause: &str) -> String {
    let flat: String = clause.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > CLAUSE_PREVIEW_CHARS {
        let cut: String = flat.chars().take(CLAUSE_PREVIEW_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        flat
    }
}

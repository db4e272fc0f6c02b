//! Clause location: find where a quoted clause sits inside a contract.
//!
//! The analysis step quotes clauses from the document, but the quote often
//! drifts from the source: PDF extraction breaks lines, whitespace gets
//! collapsed, punctuation is dropped or added. Location therefore runs in two
//! passes:
//!
//! 1. **Exact**: the clause occurs verbatim; take the first occurrence.
//! 2. **Approximate**: split the clause into words and look for a run of
//!    those words in order, allowing up to [`MAX_GAP_CHARS`] arbitrary
//!    characters between neighbours. The first [`MAX_RUN_WORDS`] words fix the
//!    start; for longer clauses the last [`MAX_RUN_WORDS`] words, searched from
//!    that start onwards, fix the end.
//!
//! Matching is literal and case-sensitive. The word-run search is an explicit
//! backtracking scan with memoised dead states, so its cost is bounded by
//! `document.len() * MAX_RUN_WORDS * (MAX_GAP_CHARS + 1)` and nothing in it
//! can fail: a clause without enough words is simply [`Located::NotFound`].

use std::collections::HashSet;

use crate::span::Span;

/// Words used for each of the head and tail runs.
pub const MAX_RUN_WORDS: usize = 6;

/// Maximum number of characters allowed between consecutive words of a run.
pub const MAX_GAP_CHARS: usize = 30;

/// Clauses with fewer words than this are never located approximately.
pub const MIN_WORDS: usize = 2;

/// Outcome of locating one clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Located {
    /// The clause occurs verbatim at this span.
    Exact(Span),
    /// Best-effort span bounded by the detected head and tail word runs.
    Approximate(Span),
    NotFound,
}

impl Located {
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Exact(span) | Self::Approximate(span) => Some(*span),
            Self::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

/// Characters that belong to a word: any alphanumeric scalar in any script
/// (Latin, Hangul, CJK, ...) plus `_`.
pub fn is_word_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Split `text` into maximal runs of word characters.
pub fn extract_words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut word_start = None;

    for (i, c) in text.char_indices() {
        match (is_word_char(c), word_start) {
            (true, None) => word_start = Some(i),
            (false, Some(start)) => {
                words.push(&text[start..i]);
                word_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = word_start {
        words.push(&text[start..]);
    }

    words
}

/// Locate `clause` in `document`.
pub fn locate(document: &str, clause: &str) -> Located {
    if let Some(span) = find_exact(document, clause) {
        return Located::Exact(span);
    }

    let words = extract_words(clause);
    if words.len() < MIN_WORDS {
        return Located::NotFound;
    }

    let head = &words[..words.len().min(MAX_RUN_WORDS)];
    let Some(head_run) = find_run(document, head, 0) else {
        return Located::NotFound;
    };

    let end = if words.len() > MAX_RUN_WORDS {
        let tail = &words[words.len() - MAX_RUN_WORDS..];
        match find_run(document, tail, head_run.start) {
            // A tail run that overlaps the head may close before it; never
            // let the span shrink below the head run.
            Some(tail_run) => tail_run.end.max(head_run.end),
            None => head_run.end,
        }
    } else {
        head_run.end
    };

    Located::Approximate(Span::new(head_run.start, end))
}

/// Start offset of `clause` using the exact pass and the head run only.
///
/// Cheaper than [`locate`] when the caller needs a position but not an extent.
pub fn locate_start(document: &str, clause: &str) -> Option<usize> {
    if let Some(span) = find_exact(document, clause) {
        return Some(span.start);
    }

    let words = extract_words(clause);
    if words.len() < MIN_WORDS {
        return None;
    }
    let head = &words[..words.len().min(MAX_RUN_WORDS)];
    find_run(document, head, 0).map(|run| run.start)
}

fn find_exact(document: &str, clause: &str) -> Option<Span> {
    if clause.is_empty() {
        return None;
    }
    document
        .find(clause)
        .map(|start| Span::new(start, start + clause.len()))
}

/// Find the leftmost run of `words` starting at or after byte `from`.
///
/// Among runs sharing that start, gaps are chosen shortest-first word by word,
/// so the returned end is the one a lazy left-to-right matcher would report.
fn find_run(haystack: &str, words: &[&str], from: usize) -> Option<Span> {
    let (first, rest) = words.split_first()?;
    if first.is_empty() {
        return None;
    }

    // (position, words remaining) pairs already proven not to complete a run.
    let mut dead: HashSet<(usize, usize)> = HashSet::new();
    let mut pos = from;

    while let Some(offset) = haystack[pos..].find(first) {
        let start = pos + offset;
        if let Some(end) = extend_run(haystack, start + first.len(), rest, &mut dead) {
            return Some(Span::new(start, end));
        }
        // Step one char, not one word: occurrences of `first` may overlap.
        pos = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }

    None
}

fn extend_run(
    haystack: &str,
    pos: usize,
    words: &[&str],
    dead: &mut HashSet<(usize, usize)>,
) -> Option<usize> {
    let Some((word, rest)) = words.split_first() else {
        return Some(pos);
    };
    let key = (pos, words.len());
    if dead.contains(&key) {
        return None;
    }

    let mut cursor = pos;
    for _ in 0..=MAX_GAP_CHARS {
        if haystack[cursor..].starts_with(word)
            && let Some(end) = extend_run(haystack, cursor + word.len(), rest, dead)
        {
            return Some(end);
        }
        match haystack[cursor..].chars().next() {
            Some(c) => cursor += c.len_utf8(),
            None => break,
        }
    }

    dead.insert(key);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of<'a>(document: &'a str, located: Located) -> &'a str {
        &document[located.span().expect("clause should be located").range()]
    }

    #[test]
    fn exact_clause_takes_first_occurrence() {
        let doc = "The vendor shall indemnify the client for all damages.";
        let located = locate(doc, "shall indemnify the client");
        assert_eq!(located, Located::Exact(Span::new(11, 37)));
        assert_eq!(text_of(doc, located), "shall indemnify the client");

        let repeated = "pay on time. pay on time.";
        assert_eq!(
            locate(repeated, "pay on time"),
            Located::Exact(Span::new(0, 11))
        );
    }

    #[test]
    fn exact_pass_runs_before_word_threshold() {
        // A single-word clause is fine as long as it occurs verbatim.
        let doc = "Termination is immediate.";
        assert_eq!(
            locate(doc, "Termination"),
            Located::Exact(Span::new(0, 11))
        );
    }

    #[test]
    fn reformatted_clause_located_approximately() {
        let doc = "The Tenant shall,\n  at its own cost,\nrepair all damage.";
        let located = locate(doc, "The Tenant shall at its own cost repair all damage");
        assert!(matches!(located, Located::Approximate(_)));
        assert_eq!(
            text_of(doc, located),
            "The Tenant shall,\n  at its own cost,\nrepair all damage"
        );
    }

    #[test]
    fn long_clause_end_comes_from_tail_run() {
        let doc = "Article 9. The Tenant shall,\nat its own cost, repair all damage\ncaused by its staff. Article 10.";
        let clause = "The Tenant shall at its own cost repair all damage caused by its staff";
        let located = locate(doc, clause);
        assert!(matches!(located, Located::Approximate(_)));
        let text = text_of(doc, located);
        assert!(text.starts_with("The Tenant"));
        assert!(text.ends_with("its staff"));
    }

    #[test]
    fn tail_run_ending_inside_head_is_clamped_to_head_end() {
        // The tail words all match the first "y" run, which closes at 10
        // while the head run reaches 12.
        let doc = "yy-y-y-y-y-y.";
        let located = locate(doc, "yy y y y y y y");
        assert_eq!(located, Located::Approximate(Span::new(0, 12)));
        assert_eq!(text_of(doc, located), "yy-y-y-y-y-y");
    }

    #[test]
    fn missing_tail_falls_back_to_head_end() {
        let doc = "one, two, three, four, five, six, seven and more";
        let clause = "one two three four five six seven eight nine";
        let located = locate(doc, clause);
        let six_end = doc.find("six").unwrap() + "six".len();
        assert_eq!(located, Located::Approximate(Span::new(0, six_end)));
    }

    #[test]
    fn hangul_clause_with_inserted_noise() {
        let noise = "~".repeat(20);
        let doc = format!(
            "제5조(해지)\n해당 계약은 을의 {noise} 책임으로 종료된다.\n{noise} 다만 갑은 손해를 배상한다. 끝."
        );
        let clause = "해당 계약은 을의 책임으로 종료된다. 다만 갑은 손해를 배상한다";
        let located = locate(&doc, clause);
        assert!(matches!(located, Located::Approximate(_)));
        let text = text_of(&doc, located);
        assert!(text.starts_with("해당 계약은"));
        assert!(text.ends_with("배상한다"));
    }

    #[test]
    fn short_hangul_clause_with_ellipsis() {
        let doc = "해당 계약은 을의 책임으로 종료된다";
        let located = locate(doc, "계약은... 책임으로 종료된다");
        assert!(matches!(located, Located::Approximate(_)));
        assert_eq!(text_of(doc, located), "계약은 을의 책임으로 종료된다");
    }

    #[test]
    fn forty_noise_chars_across_two_gaps() {
        let noise = "*".repeat(20);
        let doc = format!("제3조 해당 계약은 을의 {noise} 책임으로 {noise} 종료된다. 제4조");
        let located = locate(&doc, "계약은... 책임으로 종료된다");
        assert!(matches!(located, Located::Approximate(_)));
        let text = text_of(&doc, located);
        assert!(text.starts_with("계약은"));
        assert!(text.ends_with("종료된다"));
    }

    #[test]
    fn single_word_clause_not_found() {
        let doc = "Liability is capped at the fees paid.";
        assert_eq!(locate(doc, "liability!"), Located::NotFound);
        assert_eq!(locate(doc, "capped."), Located::NotFound);
    }

    #[test]
    fn punctuation_only_clause_not_found() {
        assert_eq!(locate("a (b) c", "(( ... ))"), Located::NotFound);
        assert_eq!(locate("a (b) c", ""), Located::NotFound);
        assert_eq!(locate_start("a (b) c", "?!"), None);
    }

    #[test]
    fn matching_is_case_sensitive() {
        let doc = "The Vendor Shall Deliver";
        assert_eq!(locate(doc, "the vendor shall deliver."), Located::NotFound);
    }

    #[test]
    fn gap_limit_is_inclusive() {
        let at_limit = format!("alpha{}beta", "-".repeat(MAX_GAP_CHARS));
        assert!(locate(&at_limit, "alpha beta").is_found());

        let past_limit = format!("alpha{}beta", "-".repeat(MAX_GAP_CHARS + 1));
        assert_eq!(locate(&past_limit, "alpha beta"), Located::NotFound);
    }

    #[test]
    fn gap_counts_characters_not_bytes() {
        // 30 three-byte chars is 90 bytes but still within the limit.
        let doc = format!("alpha{}beta", "가".repeat(MAX_GAP_CHARS));
        assert!(locate(&doc, "alpha beta").is_found());
    }

    #[test]
    fn backtracks_to_later_word_occurrence() {
        // From the first "b2", "c3" is 32 chars away; from the second it is 10.
        let doc = format!("a1 b2{}b2{}c3", " ".repeat(20), " ".repeat(10));
        let located = locate(&doc, "a1, b2, c3");
        assert_eq!(located, Located::Approximate(Span::new(0, doc.len())));
    }

    #[test]
    fn overlapping_first_word_occurrences_are_tried() {
        // "zz" is 31 chars past the "aa" at 0 but only 30 past the one at 1.
        let doc = format!("aaa{}zz", "-".repeat(MAX_GAP_CHARS));
        let located = locate(&doc, "aa zz");
        assert_eq!(located, Located::Approximate(Span::new(1, doc.len())));
    }

    #[test]
    fn locate_start_ignores_tail() {
        let doc = "one, two, three, four, five, six, seven";
        let clause = "one two three four five six seven eight nine";
        assert_eq!(locate_start(doc, clause), Some(0));
        assert_eq!(locate_start(doc, "three four"), Some(10));
        assert_eq!(locate_start(doc, "three, four"), Some(10));
    }

    #[test]
    fn extract_words_splits_mixed_scripts() {
        assert_eq!(
            extract_words("갑(甲)은 API_key를 3일 내 반환!"),
            vec!["갑", "甲", "은", "API_key를", "3일", "내", "반환"]
        );
        assert!(extract_words("... -- !!").is_empty());
    }
}

//! Shallow text helpers shared by the analyzers.

use std::collections::BTreeSet;

use crate::domain::{ErrorEntry, IterationHistoryEntry};

/// Normalize an error message so the same failure reported with different
/// line numbers or spacing compares equal.
///
/// Lowercases, replaces digit runs with `n`, collapses whitespace.
pub fn normalize_error_message(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut in_digits = false;
    for c in message.trim().to_lowercase().chars() {
        if c.is_ascii_digit() {
            if !in_digits {
                out.push('n');
            }
            in_digits = true;
            continue;
        }
        in_digits = false;
        out.push(c);
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `s` to at most `max` characters, marking the cut with `...`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// An error message that keeps coming back across iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringError {
    pub normalized: String,
    /// First occurrence, used for wording.
    pub sample: ErrorEntry,
    /// Number of distinct iterations the message appeared in.
    pub occurrences: usize,
    pub files: BTreeSet<String>,
}

/// Messages that appear in at least `min_occurrences` distinct iterations,
/// in order of first appearance.
pub fn recurring_errors(
    iterations: &[IterationHistoryEntry],
    min_occurrences: usize,
) -> Vec<RecurringError> {
    let mut found: Vec<RecurringError> = Vec::new();
    for iteration in iterations {
        let mut seen_here = BTreeSet::new();
        for error in &iteration.errors {
            let normalized = normalize_error_message(&error.message);
            if !seen_here.insert(normalized.clone()) {
                continue;
            }
            match found.iter_mut().find(|r| r.normalized == normalized) {
                Some(entry) => {
                    entry.occurrences += 1;
                    entry.files.extend(error.file.clone());
                }
                None => found.push(RecurringError {
                    normalized,
                    sample: error.clone(),
                    occurrences: 1,
                    files: error.file.iter().cloned().collect(),
                }),
            }
        }
    }
    found.retain(|r| r.occurrences >= min_occurrences);
    found
}

/// Paths named by a unified diff (`+++ b/...` and `diff --git` headers).
pub fn diff_paths(diff: &str) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();
    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("+++ ") {
            let path = rest.trim().trim_start_matches("b/");
            if path != "/dev/null" && !path.is_empty() {
                paths.insert(path.to_string());
            }
        } else if let Some(rest) = line.strip_prefix("diff --git ") {
            if let Some(b) = rest.split_whitespace().nth(1) {
                paths.insert(b.trim_start_matches("b/").to_string());
            }
        }
    }
    paths
}

/// Whether `touched` names the same file as `expected`, allowing one to be a
/// path suffix of the other.
pub fn same_file(touched: &str, expected: &str) -> bool {
    let t = touched.trim_start_matches("./");
    let e = expected.trim_start_matches("./");
    t == e || t.ends_with(&format!("/{e}")) || e.ends_with(&format!("/{t}"))
}

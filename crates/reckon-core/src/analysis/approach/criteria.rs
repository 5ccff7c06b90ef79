//! The five effectiveness criteria and the rule table they are matched
//! against.

use std::collections::BTreeSet;

use crate::analysis::text::{recurring_errors, same_file};
use crate::analysis::trend::slope_trend;
use crate::domain::{AssessmentContext, Effectiveness, TrendDirection};

pub(crate) const TREND_WINDOW: usize = 4;
pub(crate) const SLOPE_THRESHOLD: f64 = 0.2;
const REPEAT_WINDOW: usize = 5;
const REPEAT_OCCURRENCES: usize = 3;
const MIN_COVERAGE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Criteria {
    pub errors_decreasing: bool,
    pub tests_improving: bool,
    pub no_repeated_errors: bool,
    pub files_progressing: bool,
    pub no_scope_creep: bool,
}

impl Criteria {
    pub fn evaluate(ctx: &AssessmentContext) -> Self {
        let counts = ctx.error_counts();
        let (trend, _) = slope_trend(&counts, TREND_WINDOW, SLOPE_THRESHOLD);
        let tail_clean = counts.iter().rev().take(TREND_WINDOW).all(|c| *c == 0.0);

        let recent_start = ctx.iterations.len().saturating_sub(REPEAT_WINDOW);
        let repeated = recurring_errors(&ctx.iterations[recent_start..], REPEAT_OCCURRENCES);

        Self {
            errors_decreasing: trend == TrendDirection::Decreasing || tail_clean,
            tests_improving: tests_improving(ctx),
            no_repeated_errors: repeated.is_empty(),
            files_progressing: files_progressing(ctx),
            no_scope_creep: unexpected_files(ctx) <= scope_allowance(ctx),
        }
    }

    pub fn as_array(&self) -> [bool; 5] {
        [
            self.errors_decreasing,
            self.tests_improving,
            self.no_repeated_errors,
            self.files_progressing,
            self.no_scope_creep,
        ]
    }

    pub fn true_count(&self) -> usize {
        self.as_array().iter().filter(|c| **c).count()
    }
}

fn is_test_failure(error_type: &str, message: &str) -> bool {
    let text = format!("{error_type} {message}").to_lowercase();
    ["test", "assert", "expect"].iter().any(|w| text.contains(w))
}

/// Test-related failures in the latest iteration did not go up.
fn tests_improving(ctx: &AssessmentContext) -> bool {
    let failures: Vec<usize> = ctx
        .iterations
        .iter()
        .map(|it| {
            it.errors
                .iter()
                .filter(|e| is_test_failure(&e.error_type, &e.message))
                .count()
        })
        .collect();
    match failures.as_slice() {
        [.., previous, latest] => latest <= previous,
        _ => true,
    }
}

/// New files showed up in the last two iterations and at least 30% of the
/// expected files have been touched.
fn files_progressing(ctx: &AssessmentContext) -> bool {
    let split = ctx.iterations.len().saturating_sub(2);
    let earlier: BTreeSet<&str> = ctx.iterations[..split]
        .iter()
        .flat_map(|it| it.files_touched.iter().map(|c| c.path.as_str()))
        .collect();
    let new_files = ctx.iterations[split..]
        .iter()
        .flat_map(|it| it.files_touched.iter())
        .any(|c| !earlier.contains(c.path.as_str()));
    if !new_files {
        return false;
    }
    if ctx.expected_files.is_empty() {
        return true;
    }
    let touched = ctx.touched_paths();
    let covered = ctx
        .expected_files
        .iter()
        .filter(|e| touched.iter().any(|t| same_file(t, e)))
        .count();
    covered as f64 / ctx.expected_files.len() as f64 >= MIN_COVERAGE
}

pub(crate) fn unexpected_files(ctx: &AssessmentContext) -> usize {
    if ctx.expected_files.is_empty() {
        return 0;
    }
    ctx.touched_paths()
        .iter()
        .filter(|t| !ctx.expected_files.iter().any(|e| same_file(t, e)))
        .count()
}

fn scope_allowance(ctx: &AssessmentContext) -> usize {
    3.max(ctx.expected_files.len() / 2)
}

/// One row of the effectiveness table. `None` matches either value.
struct EffectivenessRule {
    name: &'static str,
    pattern: [Option<bool>; 5],
    effectiveness: Effectiveness,
}

impl EffectivenessRule {
    fn matches(&self, criteria: &[bool; 5]) -> bool {
        self.pattern
            .iter()
            .zip(criteria.iter())
            .all(|(want, have)| want.is_none_or(|w| w == *have))
    }
}

const T: Option<bool> = Some(true);
const F: Option<bool> = Some(false);
const ANY: Option<bool> = None;

// columns: errors_decreasing, tests_improving, no_repeated_errors,
// files_progressing, no_scope_creep
const RULES: &[EffectivenessRule] = &[
    EffectivenessRule {
        name: "all_good",
        pattern: [T, T, T, T, T],
        effectiveness: Effectiveness::Working,
    },
    EffectivenessRule {
        name: "regressing_with_scope_creep",
        pattern: [F, F, ANY, ANY, F],
        effectiveness: Effectiveness::WrongDirection,
    },
    EffectivenessRule {
        name: "looping_on_same_errors",
        pattern: [F, ANY, F, F, ANY],
        effectiveness: Effectiveness::Stuck,
    },
    EffectivenessRule {
        name: "errors_and_scope_creep",
        pattern: [F, ANY, ANY, ANY, F],
        effectiveness: Effectiveness::WrongDirection,
    },
    EffectivenessRule {
        name: "converging",
        pattern: [T, ANY, T, ANY, T],
        effectiveness: Effectiveness::Working,
    },
    EffectivenessRule {
        name: "repeating_errors",
        pattern: [ANY, ANY, F, ANY, ANY],
        effectiveness: Effectiveness::Struggling,
    },
    EffectivenessRule {
        name: "fixing_without_moving",
        pattern: [T, ANY, ANY, F, ANY],
        effectiveness: Effectiveness::Struggling,
    },
];

/// First matching rule, with its name for logging.
pub fn match_rule(criteria: &Criteria) -> Option<(&'static str, Effectiveness)> {
    let values = criteria.as_array();
    RULES
        .iter()
        .find(|rule| rule.matches(&values))
        .map(|rule| (rule.name, rule.effectiveness))
}

/// Used when no rule matches.
pub fn fallback(ctx: &AssessmentContext, criteria: &Criteria) -> Effectiveness {
    let (trend, _) = slope_trend(&ctx.error_counts(), TREND_WINDOW, SLOPE_THRESHOLD);
    match trend {
        TrendDirection::Increasing if !criteria.no_scope_creep => Effectiveness::WrongDirection,
        TrendDirection::Increasing if ctx.iterations.len() >= 6 => Effectiveness::Stuck,
        TrendDirection::Increasing => Effectiveness::Struggling,
        TrendDirection::Stable => {
            let latest = ctx.iterations.last().map_or(0, |it| it.errors.len());
            if latest > 0 {
                Effectiveness::Struggling
            } else {
                Effectiveness::Working
            }
        }
        TrendDirection::Decreasing => Effectiveness::Working,
    }
}

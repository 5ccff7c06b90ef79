//! ProgressAssessor - 完了度の推定
//!
//! Turns the iteration history into a completion estimate and a confidence
//! score. Pure: the same context and `now` always give the same assessment.
//!
//! # 指標
//! - iteration ratio: iterations / max iterations
//! - time ratio: elapsed / estimated
//! - file ratio: expected files touched / expected files
//! - error trend: least-squares slope over the last 5 iterations
//! - unique errors: distinct normalized messages across history and now
//! - success streak: trailing run of zero-error iterations

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::text::{diff_paths, normalize_error_message, recurring_errors, same_file, truncate};
use super::trend::slope_trend;
use crate::domain::{
    AssessmentContext, ErrorSeverity, ProgressAssessment, Risk, RiskType, TrendDirection,
};

pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.3;
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

const TREND_WINDOW: usize = 5;
const SLOPE_THRESHOLD: f64 = 0.2;
const CONFIDENCE_CEILING: f64 = 0.95;
const PERSISTENT_OCCURRENCES: usize = 3;

// completion weights
const W_ITERATION: f64 = 0.25;
const W_ERROR: f64 = 0.30;
const W_FILES: f64 = 0.20;
const W_STREAK: f64 = 0.15;
const W_TIME: f64 = 0.10;

#[derive(Debug, Clone)]
pub struct ProgressAssessor {
    confidence_floor: f64,
    default_max_iterations: u32,
}

impl Default for ProgressAssessor {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_FLOOR, DEFAULT_MAX_ITERATIONS)
    }
}

/// Raw signals extracted from a context.
#[derive(Debug, Clone)]
struct Indicators {
    iteration_count: usize,
    iteration_ratio: f64,
    time_ratio: Option<f64>,
    file_ratio: f64,
    /// Expected files are known and at least one was touched.
    file_coverage: bool,
    trend: TrendDirection,
    unique_errors: usize,
    success_streak: usize,
    /// Sum of per-iteration error counts.
    historical_errors: usize,
    peak_errors: usize,
    touched: BTreeSet<String>,
}

impl ProgressAssessor {
    pub fn new(confidence_floor: f64, default_max_iterations: u32) -> Self {
        Self {
            confidence_floor: confidence_floor.clamp(0.0, CONFIDENCE_CEILING),
            default_max_iterations: default_max_iterations.max(1),
        }
    }

    pub fn confidence_floor(&self) -> f64 {
        self.confidence_floor
    }

    pub fn assess(&self, ctx: &AssessmentContext, now: DateTime<Utc>) -> ProgressAssessment {
        let ind = self.indicators(ctx);
        let completion_estimate = self.completion(ctx, &ind);
        let confidence = self.confidence(&ind);

        ProgressAssessment {
            task_id: ctx.task_id.clone(),
            completion_estimate,
            confidence,
            remaining_work: remaining_work(ctx, &ind, completion_estimate),
            completed_work: completed_work(ctx, &ind, completion_estimate),
            blockers: blocker_notes(ctx),
            risks: risks(ctx, &ind, completion_estimate),
            estimated_remaining_ms: self.remaining_ms(ctx, &ind, completion_estimate),
            timestamp: now,
        }
    }

    fn max_iterations(&self, ctx: &AssessmentContext) -> u32 {
        ctx.max_iterations
            .filter(|m| *m > 0)
            .unwrap_or(self.default_max_iterations)
    }

    fn indicators(&self, ctx: &AssessmentContext) -> Indicators {
        let iteration_count = ctx.iterations.len();
        let iteration_ratio =
            (iteration_count as f64 / self.max_iterations(ctx) as f64).min(1.0);

        let mut touched = ctx.touched_paths();
        if let Some(diff) = &ctx.code_diff {
            touched.extend(diff_paths(diff));
        }
        touched.extend(
            ctx.iterations
                .iter()
                .flat_map(|it| it.errors.iter())
                .chain(ctx.current_errors.iter())
                .filter_map(|e| e.file.clone()),
        );

        let (file_ratio, file_coverage) = if ctx.expected_files.is_empty() {
            if touched.is_empty() {
                ((iteration_count as f64 * 0.1).min(0.7), false)
            } else {
                (1.0, false)
            }
        } else if touched.is_empty() {
            ((iteration_count as f64 * 0.1).min(0.7), false)
        } else {
            let hit = ctx
                .expected_files
                .iter()
                .filter(|e| touched.iter().any(|t| same_file(t, e)))
                .count();
            (hit as f64 / ctx.expected_files.len() as f64, true)
        };

        let counts = ctx.error_counts();
        let (trend, _) = slope_trend(&counts, TREND_WINDOW, SLOPE_THRESHOLD);

        let unique_errors = ctx
            .iterations
            .iter()
            .flat_map(|it| it.errors.iter())
            .chain(ctx.current_errors.iter())
            .map(|e| normalize_error_message(&e.message))
            .collect::<BTreeSet<_>>()
            .len();

        let success_streak = if ctx.current_errors.is_empty() {
            ctx.iterations
                .iter()
                .rev()
                .take_while(|it| it.errors.is_empty())
                .count()
        } else {
            0
        };

        Indicators {
            iteration_count,
            iteration_ratio,
            time_ratio: ctx.time_ratio(),
            file_ratio,
            file_coverage,
            trend,
            unique_errors,
            success_streak,
            historical_errors: ctx.iterations.iter().map(|it| it.errors.len()).sum(),
            peak_errors: ctx.iterations.iter().map(|it| it.errors.len()).max().unwrap_or(0),
            touched,
        }
    }

    fn completion(&self, ctx: &AssessmentContext, ind: &Indicators) -> f64 {
        let current = ctx.current_errors.len();
        let error_score = error_reduction_score(ind.trend, current, ind.historical_errors);
        let streak_score = (ind.success_streak as f64 / 3.0).min(1.0);
        let time_score = ind.time_ratio.map_or(ind.iteration_ratio, |r| r.min(1.0));

        let mut estimate = W_ITERATION * ind.iteration_ratio
            + W_ERROR * error_score
            + W_FILES * ind.file_ratio
            + W_STREAK * streak_score
            + W_TIME * time_score;

        if current > 0 {
            estimate = estimate.min(0.9) - (0.05 * current as f64).min(0.2);
        }
        estimate.clamp(0.0, 1.0)
    }

    fn confidence(&self, ind: &Indicators) -> f64 {
        let mut confidence = self.confidence_floor;
        confidence += (0.03 * ind.iteration_count as f64).min(0.3);
        confidence += match ind.trend {
            TrendDirection::Decreasing => 0.15,
            TrendDirection::Stable => 0.05,
            TrendDirection::Increasing => -0.1,
        };
        confidence += (0.05 * ind.success_streak as f64).min(0.2);
        if ind.file_coverage {
            confidence += 0.1;
        }
        if ind.unique_errors == 0 {
            confidence += 0.1;
        } else if ind.unique_errors > 5 {
            confidence -= 0.1;
        }
        confidence.clamp(self.confidence_floor, CONFIDENCE_CEILING)
    }

    fn remaining_ms(&self, ctx: &AssessmentContext, ind: &Indicators, estimate: f64) -> u64 {
        let left = 1.0 - estimate;
        if left <= 0.0 {
            return 0;
        }
        if let Some(elapsed) = ctx.elapsed_ms.filter(|_| estimate > 0.05) {
            return (elapsed as f64 * left / estimate).round() as u64;
        }
        if let Some(total) = ctx.estimated_duration_ms {
            return (total as f64 * left).round() as u64;
        }
        if ind.iteration_count == 0 {
            return 0;
        }
        let avg = ctx.iterations.iter().map(|it| it.duration_ms).sum::<u64>() as f64
            / ind.iteration_count as f64;
        let budget_left = (self.max_iterations(ctx) as usize)
            .saturating_sub(ind.iteration_count)
            .max(1);
        (avg * budget_left as f64).round() as u64
    }
}

/// 0-1 score for how well errors are being driven down.
fn error_reduction_score(trend: TrendDirection, current: usize, historical: usize) -> f64 {
    if current == 0 && historical == 0 {
        return 1.0;
    }
    let ratio = if historical == 0 {
        1.0
    } else {
        (current as f64 / historical as f64).min(1.0)
    };
    let score = match trend {
        TrendDirection::Decreasing => 0.8 + 0.2 * (1.0 - ratio),
        TrendDirection::Stable => 0.5 * (1.0 - ratio / 2.0),
        TrendDirection::Increasing => 0.3 * (1.0 - ratio / 2.0),
    };
    if current == 0 { score.max(0.7) } else { score }
}

fn untouched_expected<'a>(ctx: &'a AssessmentContext, ind: &Indicators) -> Vec<&'a str> {
    ctx.expected_files
        .iter()
        .filter(|e| !ind.touched.iter().any(|t| same_file(t, e)))
        .map(String::as_str)
        .collect()
}

fn criteria_met(ctx: &AssessmentContext, estimate: f64) -> usize {
    (estimate * ctx.acceptance_criteria.len() as f64).floor() as usize
}

fn remaining_work(ctx: &AssessmentContext, ind: &Indicators, estimate: f64) -> Vec<String> {
    let mut work = Vec::new();

    match ctx.current_errors.len() {
        0 => {}
        1 => work.push("Resolve 1 current error".to_string()),
        n => work.push(format!("Resolve {n} current errors")),
    }

    let untouched = untouched_expected(ctx, ind);
    for file in untouched.iter().take(5) {
        work.push(format!("Modify {file}"));
    }
    if untouched.len() > 5 {
        work.push(format!("... and {} more expected files", untouched.len() - 5));
    }

    let met = criteria_met(ctx, estimate);
    for criterion in ctx.acceptance_criteria.iter().skip(met) {
        work.push(format!("Verify: {criterion}"));
    }

    if ind.trend == TrendDirection::Increasing {
        work.push("Stabilize the build: error count is rising".to_string());
    }
    if work.is_empty() && estimate < 0.95 {
        work.push("Final verification and cleanup".to_string());
    }
    work
}

fn completed_work(ctx: &AssessmentContext, ind: &Indicators, estimate: f64) -> Vec<String> {
    let mut work = Vec::new();

    match ind.iteration_count {
        0 => {}
        1 => work.push("Completed 1 iteration".to_string()),
        n => work.push(format!("Completed {n} iterations")),
    }

    for file in &ctx.expected_files {
        if ind.touched.iter().any(|t| same_file(t, file)) {
            work.push(format!("Modified {file}"));
        }
    }

    let met = criteria_met(ctx, estimate);
    for criterion in ctx.acceptance_criteria.iter().take(met) {
        work.push(format!("Likely met: {criterion}"));
    }

    let current = ctx.current_errors.len();
    if ind.peak_errors > current {
        work.push(format!(
            "Reduced errors from {} to {}",
            ind.peak_errors, current
        ));
    }
    if ind.success_streak > 0 {
        work.push(format!(
            "{} consecutive iteration(s) without errors",
            ind.success_streak
        ));
    }
    work
}

fn blocker_notes(ctx: &AssessmentContext) -> Vec<String> {
    let mut notes: Vec<String> = recurring_errors(&ctx.iterations, PERSISTENT_OCCURRENCES)
        .into_iter()
        .map(|r| format!("Persistent error: {}", truncate(&r.sample.message, 100)))
        .collect();
    notes.extend(
        ctx.current_errors
            .iter()
            .filter(|e| e.severity == ErrorSeverity::Critical)
            .map(|e| format!("Critical error: {}", truncate(&e.message, 100))),
    );
    notes
}

fn risks(ctx: &AssessmentContext, ind: &Indicators, estimate: f64) -> Vec<Risk> {
    let mut risks = Vec::new();

    // time
    if let Some(ratio) = ind.time_ratio.filter(|r| *r > 0.8) {
        risks.push(
            Risk::new(
                RiskType::Time,
                format!("Elapsed time is at {:.0}% of the estimate", ratio * 100.0),
                ratio.min(1.0),
                0.6,
            )
            .with_mitigation("Reduce scope or renegotiate the time estimate"),
        );
    } else if ind.iteration_ratio > 0.8 && estimate < 0.9 {
        risks.push(
            Risk::new(
                RiskType::Time,
                "Iteration budget is nearly exhausted",
                ind.iteration_ratio,
                0.7,
            )
            .with_mitigation("Focus on the remaining acceptance criteria only"),
        );
    }

    // technical
    let persistent = recurring_errors(&ctx.iterations, PERSISTENT_OCCURRENCES).len();
    if ind.trend == TrendDirection::Increasing {
        risks.push(
            Risk::new(RiskType::Technical, "Error count is increasing", 0.7, 0.7)
                .with_mitigation("Revert to the last green iteration and retry in smaller steps"),
        );
    } else if persistent > 0 {
        risks.push(
            Risk::new(
                RiskType::Technical,
                format!("{persistent} error(s) keep recurring across iterations"),
                0.6,
                0.6,
            )
            .with_mitigation("Investigate the root cause instead of patching symptoms"),
        );
    }

    // scope
    if !ctx.expected_files.is_empty() {
        let unexpected = ind
            .touched
            .iter()
            .filter(|t| !ctx.expected_files.iter().any(|e| same_file(t, e)))
            .count();
        let allowance = 3.max(ctx.expected_files.len() / 2);
        if unexpected > allowance {
            risks.push(
                Risk::new(
                    RiskType::Scope,
                    format!("{unexpected} files outside the expected set were touched"),
                    0.5,
                    0.5,
                )
                .with_mitigation("Confirm the extra changes are required or split them out"),
            );
        }
    }

    // quality
    if ind.unique_errors > 5 {
        risks.push(Risk::new(
            RiskType::Quality,
            format!("{} distinct errors seen so far", ind.unique_errors),
            0.5,
            0.4,
        ));
    } else if estimate > 0.7 && !ctx.current_errors.is_empty() {
        risks.push(
            Risk::new(
                RiskType::Quality,
                "Nearing completion with unresolved errors",
                0.6,
                0.5,
            )
            .with_mitigation("Run the full test suite before declaring the task done"),
        );
    }

    risks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorEntry, IterationHistoryEntry};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn iteration(n: u32, errors: usize, files: &[&str]) -> IterationHistoryEntry {
        IterationHistoryEntry::new(n, t0() + Duration::minutes(n as i64))
            .with_files(files.iter().copied())
            .with_errors(
                (0..errors)
                    .map(|i| ErrorEntry::new("Error", format!("failure kind {i}")))
                    .collect(),
            )
            .with_duration_ms(60_000)
    }

    #[test]
    fn empty_context_gets_floor_level_confidence() {
        let ctx = AssessmentContext::new("t1", "empty");
        let a = ProgressAssessor::default().assess(&ctx, t0());
        assert!((0.0..=1.0).contains(&a.completion_estimate));
        assert!(a.confidence >= DEFAULT_CONFIDENCE_FLOOR);
        assert_eq!(a.timestamp, t0());
    }

    #[test]
    fn current_errors_cap_completion() {
        let iterations = (1..=10).map(|n| iteration(n, 0, &["src/a.rs"])).collect();
        let ctx = AssessmentContext::new("t1", "nearly done")
            .with_expected_files(["src/a.rs"])
            .with_iterations(iterations)
            .with_current_errors(vec![ErrorEntry::new("Error", "one left")]);
        let a = ProgressAssessor::default().assess(&ctx, t0());
        assert!(a.completion_estimate <= 0.9);
        assert!(a.remaining_work.iter().any(|w| w == "Resolve 1 current error"));
    }

    #[test]
    fn clean_finished_history_scores_high() {
        let iterations = vec![
            iteration(1, 3, &["src/a.rs"]),
            iteration(2, 1, &["src/b.rs"]),
            iteration(3, 0, &[]),
            iteration(4, 0, &[]),
            iteration(5, 0, &[]),
        ];
        let ctx = AssessmentContext::new("t1", "done")
            .with_expected_files(["src/a.rs", "src/b.rs"])
            .with_iterations(iterations)
            .with_max_iterations(5);
        let a = ProgressAssessor::default().assess(&ctx, t0());
        assert!(a.completion_estimate > 0.9, "got {}", a.completion_estimate);
        assert!(a.confidence > 0.7);
        assert!(a.completed_work.iter().any(|w| w == "Modified src/b.rs"));
    }

    #[test]
    fn rising_errors_lower_confidence_and_add_risk() {
        let iterations = (1..=5).map(|n| iteration(n, n as usize, &["x.rs"])).collect();
        let ctx = AssessmentContext::new("t1", "diverging")
            .with_iterations(iterations)
            .with_current_errors(vec![ErrorEntry::new("Error", "boom")]);
        let a = ProgressAssessor::default().assess(&ctx, t0());
        assert!(a
            .risks
            .iter()
            .any(|r| r.risk_type == RiskType::Technical && r.description.contains("increasing")));
        assert!(a.remaining_work.iter().any(|w| w.contains("rising")));
    }

    #[test]
    fn untouched_files_are_listed_as_remaining() {
        let ctx = AssessmentContext::new("t1", "files")
            .with_expected_files(["src/a.rs", "src/b.rs"])
            .with_iterations(vec![iteration(1, 0, &["src/a.rs"])]);
        let a = ProgressAssessor::default().assess(&ctx, t0());
        assert!(a.remaining_work.contains(&"Modify src/b.rs".to_string()));
        assert!(!a.remaining_work.contains(&"Modify src/a.rs".to_string()));
    }

    #[test]
    fn diff_markers_count_as_touched_files() {
        let ctx = AssessmentContext::new("t1", "diff")
            .with_expected_files(["src/a.rs"])
            .with_code_diff("diff --git a/src/a.rs b/src/a.rs\n+++ b/src/a.rs\n");
        let a = ProgressAssessor::default().assess(&ctx, t0());
        assert!(a.completed_work.contains(&"Modified src/a.rs".to_string()));
    }

    #[test]
    fn persistent_errors_become_blocker_notes() {
        let same = || vec![ErrorEntry::new("TypeError", "cannot read property of undefined")];
        let iterations = (1..=3)
            .map(|n| IterationHistoryEntry::new(n, t0()).with_errors(same()))
            .collect();
        let ctx = AssessmentContext::new("t1", "stuck").with_iterations(iterations);
        let a = ProgressAssessor::default().assess(&ctx, t0());
        assert_eq!(a.blockers.len(), 1);
        assert!(a.blockers[0].starts_with("Persistent error"));
    }

    #[test]
    fn remaining_time_projects_from_elapsed() {
        let ctx = AssessmentContext::new("t1", "timed")
            .with_iterations(vec![iteration(1, 0, &[])])
            .with_timing(Some(600_000), Some(300_000));
        let a = ProgressAssessor::default().assess(&ctx, t0());
        let e = a.completion_estimate;
        let expected = (300_000.0 * (1.0 - e) / e).round() as u64;
        assert_eq!(a.estimated_remaining_ms, expected);
    }

    #[test]
    fn time_overrun_is_a_risk() {
        let ctx = AssessmentContext::new("t1", "late")
            .with_iterations(vec![iteration(1, 0, &[])])
            .with_timing(Some(100_000), Some(95_000));
        let a = ProgressAssessor::default().assess(&ctx, t0());
        let time = a.risks.iter().find(|r| r.risk_type == RiskType::Time).unwrap();
        assert!((time.risk_score - time.probability * time.impact).abs() < 1e-9);
    }

    #[test]
    fn configured_floor_is_respected() {
        let iterations = (1..=6).map(|n| iteration(n, 8, &[])).collect();
        let ctx = AssessmentContext::new("t1", "bad")
            .with_iterations(iterations)
            .with_current_errors(vec![ErrorEntry::new("Error", "x")]);
        let a = ProgressAssessor::new(0.5, 10).assess(&ctx, t0());
        assert!(a.confidence >= 0.5);
    }
}

//! BlockerDetector - 進行を妨げている要因の検出
//!
//! Detection runs in fixed passes, most specific first:
//!
//! 1. dependency
//! 2. external service
//! 3. technical, then persistent errors without a pattern match
//! 4. unclear requirements, then contradictions in acceptance criteria
//! 5. knowledge gaps
//!
//! A single "already matched" set spans all passes, so an error that fits
//! several rows only ever yields the blocker of the earliest pass.

mod patterns;

pub use patterns::{BlockerPattern, BlockerPatternSpec, default_pattern_specs, default_patterns};

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::debug;

use super::text::{normalize_error_message, recurring_errors, truncate};
use super::trend::ratio_trend;
use crate::domain::{
    AssessmentContext, Blocker, BlockerAssessment, BlockerSeverity, BlockerType, ErrorEntry,
    TrendDirection,
};
use crate::ports::IdGenerator;

const DESCRIPTION_LIMIT: usize = 200;
const PERSISTENT_OCCURRENCES: usize = 3;
const MAX_SUGGESTED_ACTIONS: usize = 5;
const TREND_WINDOW: usize = 3;
const TREND_TOLERANCE: f64 = 0.2;

const PASSES: [BlockerType; 5] = [
    BlockerType::Dependency,
    BlockerType::External,
    BlockerType::Technical,
    BlockerType::UnclearRequirement,
    BlockerType::KnowledgeGap,
];

/// Pairs of words that flip the meaning of otherwise similar criteria.
/// `must not` is folded into the single token `mustnot` before matching.
const ANTONYMS: &[(&str, &str)] = &[
    ("must", "mustnot"),
    ("enable", "disable"),
    ("allow", "deny"),
    ("include", "exclude"),
    ("show", "hide"),
    ("always", "never"),
];

static CRITICAL_WORDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(out of memory|heap exhausted|memory exhausted|stack overflow|call stack|circular (dependency|import|reference))")
        .expect("critical wording regex")
});

#[derive(Debug, Clone)]
pub struct BlockerDetector {
    patterns: Vec<BlockerPattern>,
}

impl Default for BlockerDetector {
    fn default() -> Self {
        Self::new(default_patterns())
    }
}

/// Text a pattern can be matched against.
struct Source<'a> {
    key: String,
    text: String,
    error: Option<&'a ErrorEntry>,
}

impl BlockerDetector {
    pub fn new(patterns: Vec<BlockerPattern>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &[BlockerPattern] {
        &self.patterns
    }

    pub fn detect(
        &self,
        ctx: &AssessmentContext,
        ids: &dyn IdGenerator,
        now: DateTime<Utc>,
    ) -> BlockerAssessment {
        let sources = collect_sources(ctx);
        let mut matched: HashSet<String> = HashSet::new();
        let mut blockers = Vec::new();

        for pass in PASSES {
            for pattern in self.patterns.iter().filter(|p| p.blocker_type == pass) {
                for source in &sources {
                    if matched.contains(&source.key) || !pattern.matches(&source.text) {
                        continue;
                    }
                    matched.insert(source.key.clone());
                    blockers.push(from_pattern(pattern, source, ids, now));
                }
            }
            match pass {
                BlockerType::Technical => {
                    blockers.extend(persistent_blockers(ctx, &mut matched, ids, now))
                }
                BlockerType::UnclearRequirement => {
                    blockers.extend(contradiction_blockers(ctx, &mut matched, ids, now))
                }
                _ => {}
            }
        }

        let severity = overall_severity(&blockers);
        let needs_human = blockers.iter().any(|b| b.needs_human);
        let can_proceed = !(severity == BlockerSeverity::Critical
            || (matches!(severity, BlockerSeverity::High | BlockerSeverity::Medium)
                && needs_human));
        let error_trend = ratio_trend(&ctx.error_counts(), TREND_WINDOW, TREND_TOLERANCE);
        let suggested_actions = suggested_actions(&blockers, severity, error_trend);

        debug!(
            task_id = %ctx.task_id,
            blockers = blockers.len(),
            severity = %severity,
            can_proceed,
            "blocker detection finished"
        );

        BlockerAssessment {
            task_id: ctx.task_id.clone(),
            blockers,
            severity,
            can_proceed,
            suggested_actions,
            error_trend,
            timestamp: now,
        }
    }
}

/// Current errors, then errors of the latest iteration, then feedback.
fn collect_sources(ctx: &AssessmentContext) -> Vec<Source<'_>> {
    let latest = ctx.iterations.last().map(|it| it.errors.as_slice()).unwrap_or(&[]);
    let mut sources: Vec<Source<'_>> = ctx
        .current_errors
        .iter()
        .chain(latest.iter())
        .map(|e| Source {
            key: normalize_error_message(&e.message),
            text: format!("{} {}", e.error_type, e.message),
            error: Some(e),
        })
        .collect();

    if let Some(feedback) = ctx.agent_feedback.as_deref().filter(|f| !f.trim().is_empty()) {
        sources.push(Source {
            key: "feedback".to_string(),
            text: feedback.to_string(),
            error: None,
        });
    }
    sources
}

fn from_pattern(
    pattern: &BlockerPattern,
    source: &Source<'_>,
    ids: &dyn IdGenerator,
    now: DateTime<Utc>,
) -> Blocker {
    let detail = match source.error {
        Some(error) => error.message.as_str(),
        None => source.text.as_str(),
    };
    Blocker {
        id: ids.generate_blocker_id(),
        blocker_type: pattern.blocker_type,
        description: truncate(&format!("{}: {}", pattern.description, detail), DESCRIPTION_LIMIT),
        severity: escalate(pattern.severity, &source.text),
        affected_files: source.error.and_then(|e| e.file.clone()).into_iter().collect(),
        possible_solutions: pattern.solutions.clone(),
        needs_human: pattern.needs_human,
        detected_at: now,
    }
}

fn persistent_blockers(
    ctx: &AssessmentContext,
    matched: &mut HashSet<String>,
    ids: &dyn IdGenerator,
    now: DateTime<Utc>,
) -> Vec<Blocker> {
    recurring_errors(&ctx.iterations, PERSISTENT_OCCURRENCES)
        .into_iter()
        .filter(|r| matched.insert(r.normalized.clone()))
        .map(|r| Blocker {
            id: ids.generate_blocker_id(),
            blocker_type: BlockerType::Technical,
            description: truncate(
                &format!(
                    "Persistent error in {} iterations: {}",
                    r.occurrences, r.sample.message
                ),
                DESCRIPTION_LIMIT,
            ),
            severity: escalate(
                if r.occurrences >= 5 {
                    BlockerSeverity::High
                } else {
                    BlockerSeverity::Medium
                },
                &r.sample.message,
            ),
            affected_files: r.files.into_iter().collect(),
            possible_solutions: vec![
                "Investigate the root cause instead of retrying the same fix".to_string(),
                "Try a different implementation for the failing part".to_string(),
            ],
            needs_human: false,
            detected_at: now,
        })
        .collect()
}

fn criterion_tokens(criterion: &str) -> Vec<String> {
    let lowered = criterion.to_lowercase().replace("must not", "mustnot");
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn has_word(tokens: &[String], word: &str) -> bool {
    tokens
        .iter()
        .any(|t| t == word || (word.len() >= 5 && t.starts_with(word)))
}

fn is_antonym_word(token: &str) -> bool {
    ANTONYMS
        .iter()
        .any(|(a, b)| has_word(&[token.to_string()], a) || has_word(&[token.to_string()], b))
}

/// Two criteria share a subject and use opposite words about it.
fn contradicts(a: &[String], b: &[String]) -> bool {
    let flipped = ANTONYMS.iter().any(|(x, y)| {
        (has_word(a, x) && has_word(b, y) && !has_word(a, y))
            || (has_word(a, y) && has_word(b, x) && !has_word(b, y))
    });
    if !flipped {
        return false;
    }
    a.iter()
        .filter(|t| t.len() >= 4 && !is_antonym_word(t))
        .any(|t| b.contains(t))
}

fn contradiction_blockers(
    ctx: &AssessmentContext,
    matched: &mut HashSet<String>,
    ids: &dyn IdGenerator,
    now: DateTime<Utc>,
) -> Vec<Blocker> {
    let tokens: Vec<Vec<String>> = ctx
        .acceptance_criteria
        .iter()
        .map(|c| criterion_tokens(c))
        .collect();

    let mut blockers = Vec::new();
    for i in 0..tokens.len() {
        for j in (i + 1)..tokens.len() {
            if !contradicts(&tokens[i], &tokens[j]) {
                continue;
            }
            let key = format!("contradiction:{i}:{j}");
            if !matched.insert(key) {
                continue;
            }
            blockers.push(Blocker {
                id: ids.generate_blocker_id(),
                blocker_type: BlockerType::UnclearRequirement,
                description: truncate(
                    &format!(
                        "Acceptance criteria may contradict each other: \"{}\" vs \"{}\"",
                        ctx.acceptance_criteria[i], ctx.acceptance_criteria[j]
                    ),
                    DESCRIPTION_LIMIT,
                ),
                severity: BlockerSeverity::Medium,
                affected_files: Vec::new(),
                possible_solutions: vec![
                    "Ask the task owner which criterion takes precedence".to_string(),
                    "Rewrite the criteria so both can hold".to_string(),
                ],
                needs_human: true,
                detected_at: now,
            });
        }
    }
    blockers
}

/// Critical wording anywhere in the full source text makes the blocker
/// critical; the stored description may be truncated.
fn escalate(severity: BlockerSeverity, source_text: &str) -> BlockerSeverity {
    if CRITICAL_WORDING.is_match(source_text) {
        BlockerSeverity::Critical
    } else {
        severity
    }
}

fn overall_severity(blockers: &[Blocker]) -> BlockerSeverity {
    if blockers.is_empty() {
        return BlockerSeverity::None;
    }
    if blockers
        .iter()
        .any(|b| b.severity == BlockerSeverity::Critical)
    {
        return BlockerSeverity::Critical;
    }

    let total: f64 = blockers
        .iter()
        .map(|b| {
            let mut w = b.blocker_type.weight();
            if b.needs_human {
                w += 2.0;
            }
            if b.affected_files.len() > 3 {
                w += 1.0;
            }
            w
        })
        .sum();
    let count = blockers.len();
    let average = total / count as f64;

    let bucket = if count >= 5 || average >= 5.0 {
        BlockerSeverity::High
    } else if count >= 3 || average >= 3.0 {
        BlockerSeverity::Medium
    } else {
        BlockerSeverity::Low
    };

    if blockers.iter().any(|b| b.needs_human) {
        bucket.max(BlockerSeverity::High)
    } else {
        bucket
    }
}

fn suggested_actions(
    blockers: &[Blocker],
    severity: BlockerSeverity,
    trend: TrendDirection,
) -> Vec<String> {
    let mut actions: Vec<String> = Vec::new();
    if severity == BlockerSeverity::Critical {
        actions.push("Stop and escalate to a human before continuing".to_string());
    }
    if blockers.iter().any(|b| b.needs_human) {
        actions.push("Request clarification or access from a human".to_string());
    }
    if trend == TrendDirection::Increasing {
        actions.push("Errors are rising: return to the last working state".to_string());
    }
    for solution in blockers.iter().flat_map(|b| b.possible_solutions.iter()) {
        if !actions.contains(solution) {
            actions.push(solution.clone());
        }
    }
    actions.truncate(MAX_SUGGESTED_ACTIONS);
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IterationHistoryEntry;
    use crate::ports::{FixedClock, UlidGenerator};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn ids() -> UlidGenerator<FixedClock> {
        UlidGenerator::new(FixedClock::new(t0()))
    }

    fn detect(ctx: &AssessmentContext) -> BlockerAssessment {
        BlockerDetector::default().detect(ctx, &ids(), t0())
    }

    #[test]
    fn no_signals_means_no_blockers() {
        let a = detect(&AssessmentContext::new("t1", "clean"));
        assert!(a.blockers.is_empty());
        assert_eq!(a.severity, BlockerSeverity::None);
        assert!(a.can_proceed);
    }

    #[test]
    fn dependency_pass_wins_over_technical() {
        // matches both missing_dependency and type_or_compile_error
        let ctx = AssessmentContext::new("t1", "deps").with_current_errors(vec![
            ErrorEntry::new("TypeError", "Cannot find module './utils'").with_file("src/a.ts"),
        ]);
        let a = detect(&ctx);
        assert_eq!(a.blockers.len(), 1);
        assert_eq!(a.blockers[0].blocker_type, BlockerType::Dependency);
        assert_eq!(a.blockers[0].affected_files, vec!["src/a.ts".to_string()]);
    }

    #[test]
    fn same_error_reported_twice_yields_one_blocker() {
        let err = ErrorEntry::new("Error", "Cannot find module 'x' at line 3");
        let ctx = AssessmentContext::new("t1", "dup")
            .with_iterations(vec![
                IterationHistoryEntry::new(1, t0())
                    .with_errors(vec![ErrorEntry::new("Error", "Cannot find module 'x' at line 9")]),
            ])
            .with_current_errors(vec![err]);
        assert_eq!(detect(&ctx).blockers.len(), 1);
    }

    #[test]
    fn memory_exhaustion_is_critical_and_blocks() {
        let ctx = AssessmentContext::new("t1", "oom").with_current_errors(vec![ErrorEntry::new(
            "RangeError",
            "Maximum call stack size exceeded",
        )]);
        let a = detect(&ctx);
        assert_eq!(a.severity, BlockerSeverity::Critical);
        assert!(!a.can_proceed);
        assert!(a.suggested_actions[0].contains("escalate"));
    }

    #[test]
    fn critical_row_without_critical_wording_still_blocks() {
        let ctx = AssessmentContext::new("t1", "alloc").with_current_errors(vec![ErrorEntry::new(
            "Error",
            "allocation failed while growing buffer",
        )]);
        let a = detect(&ctx);
        assert_eq!(a.blockers[0].severity, BlockerSeverity::Critical);
        assert_eq!(a.severity, BlockerSeverity::Critical);
        assert!(!a.can_proceed);
    }

    #[test]
    fn critical_wording_past_the_description_limit_counts() {
        let message = format!("worker {} stack overflow", "w".repeat(230));
        let ctx = AssessmentContext::new("t1", "deep")
            .with_current_errors(vec![ErrorEntry::new("Error", message)]);
        let a = detect(&ctx);
        assert!(!a.blockers[0].description.contains("stack overflow"));
        assert_eq!(a.severity, BlockerSeverity::Critical);
        assert!(!a.can_proceed);
    }

    #[test]
    fn import_cycle_is_critical() {
        let ctx = AssessmentContext::new("t1", "cycle").with_current_errors(vec![ErrorEntry::new(
            "Error",
            "import cycle not allowed",
        )]);
        let a = detect(&ctx);
        assert_eq!(a.blockers[0].blocker_type, BlockerType::Dependency);
        assert_eq!(a.severity, BlockerSeverity::Critical);
    }

    #[test]
    fn needs_human_raises_severity_to_high() {
        let ctx = AssessmentContext::new("t1", "auth").with_current_errors(vec![ErrorEntry::new(
            "HttpError",
            "403 Forbidden",
        )]);
        let a = detect(&ctx);
        assert_eq!(a.severity, BlockerSeverity::High);
        assert!(a.has_human_blocker());
        assert!(!a.can_proceed);
    }

    #[test]
    fn single_type_error_is_low_and_can_proceed() {
        let ctx = AssessmentContext::new("t1", "types").with_current_errors(vec![ErrorEntry::new(
            "TypeError",
            "x is not a function",
        )]);
        let a = detect(&ctx);
        assert_eq!(a.severity, BlockerSeverity::Low);
        assert!(a.can_proceed);
    }

    #[test]
    fn persistent_error_surfaces_without_pattern() {
        let iterations = (1..=3)
            .map(|n| {
                IterationHistoryEntry::new(n, t0())
                    .with_errors(vec![ErrorEntry::new("AssertionError", "expected 3 got 4")])
            })
            .collect();
        let ctx = AssessmentContext::new("t1", "persistent").with_iterations(iterations);
        let a = detect(&ctx);
        assert_eq!(a.blockers.len(), 1);
        assert!(a.blockers[0].description.starts_with("Persistent error in 3 iterations"));
    }

    #[test]
    fn feedback_marks_unclear_requirement() {
        let ctx = AssessmentContext::new("t1", "vague")
            .with_feedback("The pagination requirement is ambiguous, should it be cursor based?");
        let a = detect(&ctx);
        assert_eq!(a.blockers.len(), 1);
        assert_eq!(a.blockers[0].blocker_type, BlockerType::UnclearRequirement);
        assert!(a.blockers[0].needs_human);
    }

    #[test]
    fn antonym_criteria_are_flagged() {
        let ctx = AssessmentContext::new("t1", "contradiction").with_acceptance_criteria([
            "The export button must be visible to admins",
            "The export button must not be visible to guests",
            "Logs are written to disk",
        ]);
        let a = detect(&ctx);
        assert_eq!(a.blockers.len(), 1);
        assert!(a.blockers[0].description.contains("contradict"));
    }

    #[test]
    fn unrelated_antonyms_are_not_contradictions() {
        let ctx = AssessmentContext::new("t1", "fine").with_acceptance_criteria([
            "Enable caching for reports",
            "Disable telemetry by default",
        ]);
        assert!(detect(&ctx).blockers.is_empty());
    }

    #[test]
    fn descriptions_are_truncated() {
        let long = format!("Cannot find module {}", "x".repeat(400));
        let ctx = AssessmentContext::new("t1", "long")
            .with_current_errors(vec![ErrorEntry::new("Error", long)]);
        let a = detect(&ctx);
        assert_eq!(a.blockers[0].description.chars().count(), DESCRIPTION_LIMIT);
    }

    #[test]
    fn many_low_blockers_bucket_by_count() {
        let errors = (0..3)
            .map(|i| ErrorEntry::new("TypeError", format!("type mismatch in handler {}", "abc".repeat(i + 1))))
            .collect();
        let ctx = AssessmentContext::new("t1", "many").with_current_errors(errors);
        let a = detect(&ctx);
        assert_eq!(a.blockers.len(), 3);
        assert_eq!(a.severity, BlockerSeverity::Medium);
        assert!(a.can_proceed);
    }

    #[test]
    fn detector_trend_uses_window_means() {
        let iterations = [4usize, 4, 4, 1, 1, 1]
            .iter()
            .enumerate()
            .map(|(i, n)| {
                IterationHistoryEntry::new(i as u32 + 1, t0()).with_errors(
                    (0..*n)
                        .map(|k| ErrorEntry::new("Lint", format!("warning {}", "z".repeat(k + i))))
                        .collect(),
                )
            })
            .collect();
        let ctx = AssessmentContext::new("t1", "trend").with_iterations(iterations);
        assert_eq!(detect(&ctx).error_trend, TrendDirection::Decreasing);
    }
}

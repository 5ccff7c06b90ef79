//! Insight generation from stored outcomes. Pure.

use std::collections::{BTreeSet, HashMap};

use crate::domain::{HistoricalInsight, TaskOutcome};

const TOP_ITEMS: usize = 3;

/// All insights for one task-type bucket, overall first.
///
/// Returns nothing when `outcomes` is below `min_sample_size`. Each of the
/// success, failure and quick-completion insights has to reach the same
/// threshold within its own subset.
pub fn generate(task_type: &str, outcomes: &[TaskOutcome], min_sample_size: usize) -> Vec<HistoricalInsight> {
    let min = min_sample_size.max(1);
    if outcomes.len() < min {
        return Vec::new();
    }

    let mut insights = vec![overall(task_type, outcomes)];

    let successes: Vec<TaskOutcome> = outcomes.iter().filter(|o| o.success).cloned().collect();
    if successes.len() >= min {
        insights.push(success_pattern(task_type, &successes));
    }

    let failures: Vec<TaskOutcome> = outcomes.iter().filter(|o| !o.success).cloned().collect();
    if failures.len() >= min {
        insights.push(failure_pattern(task_type, &failures));
    }

    let average_time = mean(outcomes.iter().map(|o| o.time_spent_ms as f64));
    let quick: Vec<TaskOutcome> = outcomes
        .iter()
        .filter(|o| (o.time_spent_ms as f64) < average_time)
        .cloned()
        .collect();
    if quick.len() >= min {
        insights.push(quick_pattern(task_type, &quick));
    }

    insights
}

fn overall(task_type: &str, outcomes: &[TaskOutcome]) -> HistoricalInsight {
    HistoricalInsight {
        pattern: format!("Overall pattern for {task_type} tasks"),
        common_blockers: frequent_blockers(outcomes),
        recommended_approach: best_approach(outcomes),
        ..summary(task_type, outcomes)
    }
}

fn success_pattern(task_type: &str, successes: &[TaskOutcome]) -> HistoricalInsight {
    HistoricalInsight {
        pattern: format!("Success pattern for {task_type} tasks"),
        common_blockers: frequent_blockers(successes),
        recommended_approach: best_approach(successes),
        avoid: top_by_count(successes.iter().flat_map(|o| o.lessons_learned.iter())),
        ..summary(task_type, successes)
    }
}

fn failure_pattern(task_type: &str, failures: &[TaskOutcome]) -> HistoricalInsight {
    HistoricalInsight {
        pattern: format!("Failure pattern for {task_type} tasks"),
        common_blockers: top_by_count(failures.iter().flat_map(|o| o.blockers_encountered.iter())),
        recommended_approach: None,
        avoid: failures.iter().take(1).map(|o| o.approach.clone()).collect(),
        ..summary(task_type, failures)
    }
}

fn quick_pattern(task_type: &str, quick: &[TaskOutcome]) -> HistoricalInsight {
    HistoricalInsight {
        pattern: format!("Quick completion pattern for {task_type} tasks"),
        common_blockers: frequent_blockers(quick),
        recommended_approach: best_approach(quick),
        ..summary(task_type, quick)
    }
}

/// Rates and averages; the caller fills in the pattern-specific fields.
fn summary(task_type: &str, outcomes: &[TaskOutcome]) -> HistoricalInsight {
    let n = outcomes.len();
    let successes = outcomes.iter().filter(|o| o.success).count();
    HistoricalInsight {
        pattern: String::new(),
        task_type: task_type.to_string(),
        success_rate: if n == 0 { 0.0 } else { successes as f64 / n as f64 },
        average_iterations: mean(outcomes.iter().map(|o| o.iterations as f64)),
        average_time_ms: mean(outcomes.iter().map(|o| o.time_spent_ms as f64)),
        common_blockers: Vec::new(),
        recommended_approach: None,
        avoid: Vec::new(),
        sample_size: n,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Blockers reported by at least max(2, 20% of outcomes) outcomes.
fn frequent_blockers(outcomes: &[TaskOutcome]) -> Vec<String> {
    let threshold = 2usize.max((outcomes.len() as f64 * 0.2).ceil() as usize);
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for outcome in outcomes {
        let distinct: BTreeSet<&str> = outcome
            .blockers_encountered
            .iter()
            .map(|b| b.trim())
            .filter(|b| !b.is_empty())
            .collect();
        for blocker in distinct {
            *counts.entry(blocker).or_default() += 1;
        }
    }
    let mut frequent: Vec<(&str, usize)> = counts.into_iter().filter(|(_, c)| *c >= threshold).collect();
    frequent.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    frequent.into_iter().map(|(b, _)| b.to_string()).collect()
}

/// Most frequent items, ties broken alphabetically.
fn top_by_count<'a>(items: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for item in items.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        *counts.entry(item).or_default() += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(TOP_ITEMS)
        .map(|(s, _)| s.to_string())
        .collect()
}

/// Approach with the highest `10*successes - 0.1*avg_minutes - avg_iterations`.
/// Ties go to the approach seen first.
fn best_approach(outcomes: &[TaskOutcome]) -> Option<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&TaskOutcome>> = HashMap::new();
    for outcome in outcomes {
        let key = outcome.approach.as_str();
        if !groups.contains_key(key) {
            order.push(key);
        }
        groups.entry(key).or_default().push(outcome);
    }

    let mut best: Option<(&str, f64)> = None;
    for approach in order {
        let group = &groups[approach];
        let successes = group.iter().filter(|o| o.success).count() as f64;
        let avg_minutes = mean(group.iter().map(|o| o.time_spent_minutes()));
        let avg_iterations = mean(group.iter().map(|o| o.iterations as f64));
        let score = 10.0 * successes - 0.1 * avg_minutes - avg_iterations;
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((approach, score));
        }
    }
    best.map(|(a, _)| a.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn outcome(approach: &str, success: bool, iterations: u32, minutes: u64) -> TaskOutcome {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        TaskOutcome::new(format!("task-{approach}-{iterations}"), success, approach, at)
            .with_effort(iterations, minutes * 60_000)
    }

    #[test]
    fn below_sample_size_yields_nothing() {
        let outcomes = vec![outcome("api", true, 3, 10), outcome("api", true, 3, 10)];
        assert!(generate("api", &outcomes, 3).is_empty());
    }

    #[test]
    fn overall_rates_and_averages() {
        let outcomes = vec![
            outcome("feature", true, 4, 10),
            outcome("feature", false, 6, 20),
            outcome("feature", true, 8, 30),
        ];
        let insights = generate("feature", &outcomes, 3);
        let overall = &insights[0];
        assert_eq!(overall.pattern, "Overall pattern for feature tasks");
        assert!((overall.success_rate - 0.667).abs() < 0.01);
        assert_eq!(overall.average_iterations, 6.0);
        assert_eq!(overall.average_time_ms, 20.0 * 60_000.0);
        assert_eq!(overall.sample_size, 3);
    }

    #[test]
    fn best_approach_prefers_successes_then_speed() {
        let outcomes = vec![
            outcome("big bang rewrite", false, 9, 120),
            outcome("incremental", true, 3, 30),
            outcome("incremental", true, 4, 40),
            outcome("spike first", true, 2, 10),
        ];
        assert_eq!(best_approach(&outcomes).as_deref(), Some("incremental"));
    }

    #[test]
    fn blockers_need_two_reports() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let outcomes = vec![
            TaskOutcome::new("a", true, "x", at).with_blockers(["flaky ci", "flaky ci"]),
            TaskOutcome::new("b", true, "x", at).with_blockers(["flaky ci", "slow review"]),
            TaskOutcome::new("c", true, "x", at),
        ];
        assert_eq!(frequent_blockers(&outcomes), vec!["flaky ci".to_string()]);
    }

    #[test]
    fn failure_and_quick_patterns_are_gated() {
        let mut outcomes: Vec<TaskOutcome> = (0..3).map(|i| outcome("retry loop", false, 5, 60 + i)).collect();
        outcomes.extend((0..3).map(|i| outcome("small steps", true, 2, 5 + i)));
        let insights = generate("api", &outcomes, 3);
        let patterns: Vec<&str> = insights.iter().map(|i| i.pattern.as_str()).collect();
        assert_eq!(
            patterns,
            vec![
                "Overall pattern for api tasks",
                "Success pattern for api tasks",
                "Failure pattern for api tasks",
                "Quick completion pattern for api tasks",
            ]
        );
        assert_eq!(insights[2].avoid, vec!["retry loop".to_string()]);
        assert_eq!(insights[2].success_rate, 0.0);
        assert_eq!(insights[3].recommended_approach.as_deref(), Some("small steps"));
    }
}

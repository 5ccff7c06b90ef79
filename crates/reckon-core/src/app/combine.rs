//! Combine - 三つの評価から次の一手を決める
//!
//! [`RULES`] is evaluated top to bottom and the first matching row wins.
//! The row fixes action, priority and an intrinsic confidence; the reported
//! confidence is the mean of that and the progress and approach confidences.

use crate::domain::{
    ApproachAssessment, BlockerAssessment, BlockerSeverity, Effectiveness, ProgressAssessment,
    Recommendation, RecommendedAction,
};

pub const NO_CONTEXT_CONFIDENCE: f64 = 0.2;
pub const NO_CONTEXT_PRIORITY: u8 = 5;

struct CombinationRule {
    name: &'static str,
    when: fn(&ProgressAssessment, &BlockerAssessment, &ApproachAssessment) -> bool,
    action: RecommendedAction,
    priority: u8,
    confidence: f64,
    reason: &'static str,
}

const RULES: &[CombinationRule] = &[
    CombinationRule {
        name: "critical_blocker",
        when: |_, b, _| b.severity == BlockerSeverity::Critical,
        action: RecommendedAction::RequestHelp,
        priority: 1,
        confidence: 0.9,
        reason: "A critical blocker needs outside help",
    },
    CombinationRule {
        name: "high_blocker_failing_approach",
        when: |_, b, a| b.severity == BlockerSeverity::High && a.effectiveness.is_failing(),
        action: RecommendedAction::TryAlternative,
        priority: 1,
        confidence: 0.8,
        reason: "High-severity blockers and the current approach is not working",
    },
    CombinationRule {
        name: "high_blocker",
        when: |_, b, _| b.severity == BlockerSeverity::High,
        action: RecommendedAction::SplitTask,
        priority: 2,
        confidence: 0.7,
        reason: "High-severity blockers on an approach that is still viable",
    },
    CombinationRule {
        name: "stuck",
        when: |_, _, a| a.effectiveness == Effectiveness::Stuck,
        action: RecommendedAction::TryAlternative,
        priority: 2,
        confidence: 0.75,
        reason: "The current approach is stuck",
    },
    CombinationRule {
        name: "wrong_direction",
        when: |_, _, a| a.effectiveness == Effectiveness::WrongDirection,
        action: RecommendedAction::Abort,
        priority: 1,
        confidence: 0.8,
        reason: "The current approach is heading away from the goal",
    },
    CombinationRule {
        name: "struggling_early",
        when: |p, _, a| a.effectiveness == Effectiveness::Struggling && p.completion_estimate < 0.3,
        action: RecommendedAction::TryAlternative,
        priority: 2,
        confidence: 0.7,
        reason: "Struggling with little progress made",
    },
    CombinationRule {
        name: "struggling",
        when: |_, _, a| a.effectiveness == Effectiveness::Struggling,
        action: RecommendedAction::Continue,
        priority: 3,
        confidence: 0.6,
        reason: "Struggling, but enough progress to push through",
    },
    CombinationRule {
        name: "nearly_done",
        when: |p, _, _| p.completion_estimate > 0.8,
        action: RecommendedAction::Continue,
        priority: 4,
        confidence: 0.85,
        reason: "The task is nearly complete",
    },
    CombinationRule {
        name: "medium_blocker",
        when: |_, b, _| b.severity == BlockerSeverity::Medium,
        action: RecommendedAction::Continue,
        priority: 3,
        confidence: 0.6,
        reason: "Medium-severity blockers are present but manageable",
    },
    CombinationRule {
        name: "default",
        when: |_, _, _| true,
        action: RecommendedAction::Continue,
        priority: 3,
        confidence: 0.5,
        reason: "No significant issues detected",
    },
];

/// Pick the next step from the three assessments.
pub fn combine(
    progress: &ProgressAssessment,
    blockers: &BlockerAssessment,
    approach: &ApproachAssessment,
) -> Recommendation {
    let rule = RULES
        .iter()
        .find(|rule| (rule.when)(progress, blockers, approach))
        .unwrap_or(&RULES[RULES.len() - 1]);

    tracing::debug!(
        task_id = %progress.task_id,
        rule = rule.name,
        action = %rule.action,
        "recommendation rule matched"
    );

    Recommendation {
        action: rule.action,
        reason: rule.reason.to_string(),
        details: details(rule.action, progress, blockers, approach),
        confidence: (progress.confidence + approach.confidence + rule.confidence) / 3.0,
        priority: rule.priority,
    }
}

/// Recommendation for a task the engine has never seen a context for.
pub fn without_context() -> Recommendation {
    Recommendation {
        action: RecommendedAction::Continue,
        reason: "No assessment context is available for this task".to_string(),
        details: "Run an assessment with the current context first".to_string(),
        confidence: NO_CONTEXT_CONFIDENCE,
        priority: NO_CONTEXT_PRIORITY,
    }
}

fn details(
    action: RecommendedAction,
    progress: &ProgressAssessment,
    blockers: &BlockerAssessment,
    approach: &ApproachAssessment,
) -> String {
    let summary = format!(
        "Completion {:.0}%; {} blocker(s), severity {}; approach {}.",
        progress.completion_estimate * 100.0,
        blockers.blockers.len(),
        blockers.severity,
        approach.effectiveness,
    );

    let clause = match action {
        RecommendedAction::TryAlternative => match approach.alternatives.first() {
            Some(alt) => format!("Suggested alternative: {}", alt.description),
            None => "Rethink the current strategy".to_string(),
        },
        RecommendedAction::RequestHelp => {
            let blocker = blockers
                .blockers
                .iter()
                .max_by_key(|b| b.severity)
                .map(|b| b.description.as_str());
            match blocker {
                Some(description) => format!("Needs attention: {description}"),
                None => "Escalate to a human reviewer".to_string(),
            }
        }
        RecommendedAction::SplitTask => match progress.remaining_work.first() {
            Some(item) => format!("Split off the remaining work, starting with: {item}"),
            None => "Split the task into smaller pieces".to_string(),
        },
        RecommendedAction::Abort => format!("Stop the current approach. {}", approach.recommendation),
        RecommendedAction::Continue => match progress.remaining_work.first() {
            Some(item) => format!("Next: {item}"),
            None => "Keep going".to_string(),
        },
    };

    format!("{summary} {clause}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AlternativeApproach, AlternativeId, Blocker, BlockerId, BlockerType, TaskId,
        TrendDirection,
    };
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use ulid::Ulid;

    fn progress(completion: f64) -> ProgressAssessment {
        ProgressAssessment {
            task_id: TaskId::new("t1"),
            completion_estimate: completion,
            confidence: 0.6,
            remaining_work: vec!["Resolve 2 current error(s)".to_string()],
            completed_work: Vec::new(),
            blockers: Vec::new(),
            risks: Vec::new(),
            estimated_remaining_ms: 0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    fn blockers(severity: BlockerSeverity) -> BlockerAssessment {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let list = if severity == BlockerSeverity::None {
            Vec::new()
        } else {
            vec![Blocker {
                id: BlockerId::from(Ulid::nil()),
                blocker_type: BlockerType::External,
                description: "Credentials are missing".to_string(),
                severity,
                affected_files: Vec::new(),
                possible_solutions: Vec::new(),
                needs_human: true,
                detected_at: at,
            }]
        };
        BlockerAssessment {
            task_id: TaskId::new("t1"),
            blockers: list,
            severity,
            can_proceed: severity < BlockerSeverity::High,
            suggested_actions: Vec::new(),
            error_trend: TrendDirection::Stable,
            timestamp: at,
        }
    }

    fn approach(effectiveness: Effectiveness) -> ApproachAssessment {
        ApproachAssessment {
            task_id: TaskId::new("t1"),
            current_approach: "patch the parser".to_string(),
            effectiveness,
            confidence: 0.6,
            alternatives: vec![AlternativeApproach {
                id: AlternativeId::from(Ulid::nil()),
                description: "Revert to the last working state".to_string(),
                pros: Vec::new(),
                cons: Vec::new(),
                estimated_effort_minutes: 30.0,
                confidence: 0.7,
                required_changes: Vec::new(),
            }],
            recommendation: "Stop and rethink it.".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    #[rstest]
    #[case::critical_beats_everything(0.5, BlockerSeverity::Critical, Effectiveness::Working, RecommendedAction::RequestHelp, 1)]
    #[case::critical_with_stuck(0.5, BlockerSeverity::Critical, Effectiveness::Stuck, RecommendedAction::RequestHelp, 1)]
    #[case::high_and_stuck(0.5, BlockerSeverity::High, Effectiveness::Stuck, RecommendedAction::TryAlternative, 1)]
    #[case::high_and_wrong_direction(0.5, BlockerSeverity::High, Effectiveness::WrongDirection, RecommendedAction::TryAlternative, 1)]
    #[case::high_and_working(0.5, BlockerSeverity::High, Effectiveness::Working, RecommendedAction::SplitTask, 2)]
    #[case::stuck(0.5, BlockerSeverity::Low, Effectiveness::Stuck, RecommendedAction::TryAlternative, 2)]
    #[case::wrong_direction(0.5, BlockerSeverity::Medium, Effectiveness::WrongDirection, RecommendedAction::Abort, 1)]
    #[case::struggling_early(0.1, BlockerSeverity::None, Effectiveness::Struggling, RecommendedAction::TryAlternative, 2)]
    #[case::struggling_later(0.5, BlockerSeverity::None, Effectiveness::Struggling, RecommendedAction::Continue, 3)]
    #[case::nearly_done(0.85, BlockerSeverity::Medium, Effectiveness::Working, RecommendedAction::Continue, 4)]
    #[case::medium_blocker(0.5, BlockerSeverity::Medium, Effectiveness::Working, RecommendedAction::Continue, 3)]
    #[case::nothing_notable(0.5, BlockerSeverity::None, Effectiveness::Working, RecommendedAction::Continue, 3)]
    fn first_matching_rule_wins(
        #[case] completion: f64,
        #[case] severity: BlockerSeverity,
        #[case] effectiveness: Effectiveness,
        #[case] action: RecommendedAction,
        #[case] priority: u8,
    ) {
        let rec = combine(&progress(completion), &blockers(severity), &approach(effectiveness));
        assert_eq!(rec.action, action);
        assert_eq!(rec.priority, priority);
    }

    #[test]
    fn confidence_is_mean_of_three() {
        let rec = combine(
            &progress(0.5),
            &blockers(BlockerSeverity::Critical),
            &approach(Effectiveness::Working),
        );
        // (0.6 + 0.6 + 0.9) / 3
        assert!((rec.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn try_alternative_names_the_top_alternative() {
        let rec = combine(
            &progress(0.5),
            &blockers(BlockerSeverity::None),
            &approach(Effectiveness::Stuck),
        );
        assert!(rec.details.starts_with("Completion 50%; 0 blocker(s), severity none; approach stuck."));
        assert!(rec.details.contains("Revert to the last working state"));
    }

    #[test]
    fn request_help_names_the_blocker() {
        let rec = combine(
            &progress(0.5),
            &blockers(BlockerSeverity::Critical),
            &approach(Effectiveness::Working),
        );
        assert!(rec.details.contains("Needs attention: Credentials are missing"));
    }

    #[test]
    fn no_context_is_low_confidence_continue() {
        let rec = without_context();
        assert_eq!(rec.action, RecommendedAction::Continue);
        assert_eq!(rec.confidence, 0.2);
        assert_eq!(rec.priority, 5);
    }
}

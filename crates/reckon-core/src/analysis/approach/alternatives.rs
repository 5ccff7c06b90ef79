//! Alternative-approach templates.
//!
//! A template applies when any of its conditions holds for the current
//! situation. Conditions are derived once per evaluation by
//! [`Situation::derive`].

use std::collections::BTreeSet;

use crate::domain::{AlternativeApproach, AssessmentContext, Effectiveness};
use crate::ports::IdGenerator;

use super::criteria::{Criteria, unexpected_files};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Condition {
    Struggling,
    Stuck,
    WrongDirection,
    RepeatedErrors,
    ScopeCreep,
    Complexity,
    KnowledgeGap,
    Debugging,
    QualityIssues,
    /// The current approach tries to do everything at once.
    Comprehensive,
    TimePressure,
    Technical,
}

const KNOWLEDGE_WORDS: &[&str] = &[
    "don't know", "dont know", "unfamiliar", "not familiar", "not sure how", "documentation",
    "example",
];
const DEBUGGING_WORDS: &[&str] = &[
    "debug", "trace", "reproduce", "investigat", "stack trace", "logging",
];
const QUALITY_WORDS: &[&str] = &[
    "flaky", "quality", "messy", "hack", "workaround", "tech debt", "brittle",
];
const COMPREHENSIVE_WORDS: &[&str] = &[
    "rewrite", "entire", "whole", "everything", "comprehensive", "complete overhaul", "all at once",
];

const TIME_PRESSURE_RATIO: f64 = 0.8;
const COMPLEX_FILE_COUNT: usize = 5;

fn mentions(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// The set of conditions that hold right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Situation(BTreeSet<Condition>);

impl Situation {
    pub fn derive(
        ctx: &AssessmentContext,
        effectiveness: Effectiveness,
        criteria: &Criteria,
        current_approach: &str,
    ) -> Self {
        let mut set = BTreeSet::new();
        match effectiveness {
            Effectiveness::Working => {}
            Effectiveness::Struggling => {
                set.insert(Condition::Struggling);
            }
            Effectiveness::Stuck => {
                set.insert(Condition::Stuck);
            }
            Effectiveness::WrongDirection => {
                set.insert(Condition::WrongDirection);
            }
        }
        if !criteria.no_repeated_errors {
            set.insert(Condition::RepeatedErrors);
        }
        if !criteria.no_scope_creep {
            set.insert(Condition::ScopeCreep);
        }
        if ctx.expected_files.len() > COMPLEX_FILE_COUNT
            || unexpected_files(ctx) > COMPLEX_FILE_COUNT
        {
            set.insert(Condition::Complexity);
        }

        let feedback = ctx.agent_feedback.as_deref().unwrap_or("").to_lowercase();
        if mentions(&feedback, KNOWLEDGE_WORDS) {
            set.insert(Condition::KnowledgeGap);
        }
        if mentions(&feedback, DEBUGGING_WORDS) {
            set.insert(Condition::Debugging);
        }
        if mentions(&feedback, QUALITY_WORDS) {
            set.insert(Condition::QualityIssues);
        }
        if mentions(&current_approach.to_lowercase(), COMPREHENSIVE_WORDS) {
            set.insert(Condition::Comprehensive);
        }
        if ctx.time_ratio().is_some_and(|r| r > TIME_PRESSURE_RATIO) {
            set.insert(Condition::TimePressure);
        }
        if !ctx.current_errors.is_empty() {
            set.insert(Condition::Technical);
        }
        Self(set)
    }

    pub fn contains(&self, condition: Condition) -> bool {
        self.0.contains(&condition)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

struct Template {
    description: &'static str,
    applies_when: &'static [Condition],
    pros: &'static [&'static str],
    cons: &'static [&'static str],
    effort_minutes: f64,
    confidence: f64,
    required_changes: &'static [&'static str],
}

const TEMPLATES: &[Template] = &[
    Template {
        description: "Break the task into smaller incremental steps",
        applies_when: &[
            Condition::Struggling,
            Condition::Complexity,
            Condition::Comprehensive,
            Condition::ScopeCreep,
        ],
        pros: &["Each step can be verified on its own", "Failures stay small and local"],
        cons: &["More iterations overall"],
        effort_minutes: 45.0,
        confidence: 0.75,
        required_changes: &[
            "Split the remaining work into independent steps",
            "Verify after each step before moving on",
        ],
    },
    Template {
        description: "Revert to the last working state and retry with a different fix",
        applies_when: &[
            Condition::Stuck,
            Condition::RepeatedErrors,
            Condition::WrongDirection,
        ],
        pros: &["Removes accumulated breakage", "Gives a clean baseline"],
        cons: &["Discards recent work"],
        effort_minutes: 30.0,
        confidence: 0.7,
        required_changes: &[
            "Identify the last iteration without errors",
            "Revert later changes",
            "Apply a different fix",
        ],
    },
    Template {
        description: "Fix one error at a time, starting with the first reported",
        applies_when: &[
            Condition::Technical,
            Condition::RepeatedErrors,
            Condition::Struggling,
        ],
        pros: &["Later errors are often caused by the first one"],
        cons: &["Slow when errors are independent"],
        effort_minutes: 20.0,
        confidence: 0.65,
        required_changes: &["Sort errors by order of appearance", "Fix and re-run after each one"],
    },
    Template {
        description: "Add logging and debug the failing path before changing more code",
        applies_when: &[
            Condition::Debugging,
            Condition::Stuck,
            Condition::RepeatedErrors,
        ],
        pros: &["Replaces guessing with evidence"],
        cons: &["Instrumentation has to be removed afterwards"],
        effort_minutes: 25.0,
        confidence: 0.6,
        required_changes: &[
            "Add logging around the failing code path",
            "Reproduce the failure and read the output",
        ],
    },
    Template {
        description: "Write a failing test that reproduces the problem, then fix it",
        applies_when: &[
            Condition::QualityIssues,
            Condition::RepeatedErrors,
            Condition::Struggling,
        ],
        pros: &["Fix is verified automatically", "Guards against regressions"],
        cons: &["Writing the test takes time up front"],
        effort_minutes: 40.0,
        confidence: 0.65,
        required_changes: &["Write a minimal reproducing test", "Change code until it passes"],
    },
    Template {
        description: "Study an existing implementation of something similar and follow it",
        applies_when: &[
            Condition::KnowledgeGap,
            Condition::WrongDirection,
            Condition::Stuck,
        ],
        pros: &["Reuses conventions that already work here"],
        cons: &["A similar implementation may not exist"],
        effort_minutes: 35.0,
        confidence: 0.6,
        required_changes: &[
            "Search the codebase for comparable code",
            "Adapt its structure to this task",
        ],
    },
    Template {
        description: "Reduce scope to the minimum that satisfies the acceptance criteria",
        applies_when: &[
            Condition::TimePressure,
            Condition::ScopeCreep,
            Condition::Comprehensive,
        ],
        pros: &["Fastest route to a shippable result"],
        cons: &["Deferred work has to be tracked separately"],
        effort_minutes: 25.0,
        confidence: 0.7,
        required_changes: &[
            "List the acceptance criteria still open",
            "Drop or defer everything not required by them",
        ],
    },
    Template {
        description: "Redesign the approach starting from the requirements",
        applies_when: &[Condition::WrongDirection, Condition::Complexity],
        pros: &["Addresses a fundamentally wrong design"],
        cons: &["Highest effort", "Throws away most current work"],
        effort_minutes: 90.0,
        confidence: 0.5,
        required_changes: &[
            "Re-read the requirements",
            "Sketch a new design",
            "Implement it from scratch",
        ],
    },
];

pub(crate) const MAX_ALTERNATIVES: usize = 3;
const FAILING_BOOST: f64 = 1.15;
const CONFIDENCE_CAP: f64 = 0.95;
const LARGE_TASK_EFFORT: f64 = 1.5;

/// Ranked alternatives for a non-working approach, best first.
pub fn generate(
    ctx: &AssessmentContext,
    effectiveness: Effectiveness,
    situation: &Situation,
    ids: &dyn IdGenerator,
) -> Vec<AlternativeApproach> {
    if effectiveness == Effectiveness::Working {
        return Vec::new();
    }
    let effort_scale = if ctx.expected_files.len() > COMPLEX_FILE_COUNT {
        LARGE_TASK_EFFORT
    } else {
        1.0
    };

    let mut alternatives: Vec<AlternativeApproach> = TEMPLATES
        .iter()
        .filter(|t| t.applies_when.iter().any(|c| situation.contains(*c)))
        .map(|t| {
            let confidence = if effectiveness.is_failing() {
                (t.confidence * FAILING_BOOST).min(CONFIDENCE_CAP)
            } else {
                t.confidence
            };
            AlternativeApproach {
                id: ids.generate_alternative_id(),
                description: t.description.to_string(),
                pros: t.pros.iter().map(|s| s.to_string()).collect(),
                cons: t.cons.iter().map(|s| s.to_string()).collect(),
                estimated_effort_minutes: t.effort_minutes * effort_scale,
                confidence,
                required_changes: t.required_changes.iter().map(|s| s.to_string()).collect(),
            }
        })
        .collect();

    alternatives.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    alternatives.truncate(MAX_ALTERNATIVES);
    alternatives
}

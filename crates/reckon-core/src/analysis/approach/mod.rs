//! ApproachEvaluator - 現在の戦略が機能しているかの判定
//!
//! # 判定の流れ
//! 1. Fewer than `min_iterations` iterations: `working` at low confidence.
//! 2. Compute the five [`Criteria`].
//! 3. First matching row of the effectiveness table, or the trend-based
//!    fallback when no row matches.
//! 4. For anything but `working`, rank alternative templates.

mod alternatives;
mod criteria;

pub use alternatives::{Condition, Situation};
pub use criteria::Criteria;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{AlternativeApproach, ApproachAssessment, AssessmentContext, Effectiveness};
use crate::ports::IdGenerator;

pub const DEFAULT_MIN_ITERATIONS: usize = 3;
const INSUFFICIENT_DATA_CONFIDENCE: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct ApproachEvaluator {
    min_iterations: usize,
}

impl Default for ApproachEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_ITERATIONS)
    }
}

impl ApproachEvaluator {
    pub fn new(min_iterations: usize) -> Self {
        Self { min_iterations }
    }

    pub fn evaluate(
        &self,
        ctx: &AssessmentContext,
        ids: &dyn IdGenerator,
        now: DateTime<Utc>,
    ) -> ApproachAssessment {
        let current_approach = current_approach(ctx);
        let n = ctx.iterations.len();

        if n < self.min_iterations {
            return ApproachAssessment {
                task_id: ctx.task_id.clone(),
                current_approach,
                effectiveness: Effectiveness::Working,
                confidence: INSUFFICIENT_DATA_CONFIDENCE,
                alternatives: Vec::new(),
                recommendation: format!(
                    "Only {n} iteration(s) so far; keep going and reassess after {}",
                    self.min_iterations
                ),
                timestamp: now,
            };
        }

        let criteria = Criteria::evaluate(ctx);
        let (rule, effectiveness) = match criteria::match_rule(&criteria) {
            Some((name, effectiveness)) => (name, effectiveness),
            None => ("fallback", criteria::fallback(ctx, &criteria)),
        };
        let confidence = confidence(n, &criteria);

        let situation = Situation::derive(ctx, effectiveness, &criteria, &current_approach);
        let alternatives = alternatives::generate(ctx, effectiveness, &situation, ids);
        let recommendation =
            recommendation_text(effectiveness, alternatives.first(), ctx.current_errors.len());

        debug!(
            task_id = %ctx.task_id,
            effectiveness = %effectiveness,
            rule,
            confidence,
            alternatives = alternatives.len(),
            "approach evaluated"
        );

        ApproachAssessment {
            task_id: ctx.task_id.clone(),
            current_approach,
            effectiveness,
            confidence,
            alternatives,
            recommendation,
            timestamp: now,
        }
    }
}

fn current_approach(ctx: &AssessmentContext) -> String {
    ctx.iterations
        .iter()
        .rev()
        .map(|it| it.action.trim())
        .find(|a| !a.is_empty())
        .or_else(|| Some(ctx.description.trim()).filter(|d| !d.is_empty()))
        .unwrap_or(ctx.name.as_str())
        .to_string()
}

fn confidence(iterations: usize, criteria: &Criteria) -> f64 {
    let base = (0.4 + 0.05 * iterations as f64).min(0.8);
    let adjusted = match criteria.true_count() {
        2 | 3 => base * 0.85,
        0 | 5 => base * 1.1,
        _ => base,
    };
    adjusted.clamp(0.0, 0.95)
}

fn recommendation_text(
    effectiveness: Effectiveness,
    top: Option<&AlternativeApproach>,
    current_errors: usize,
) -> String {
    let suggestion = top.map(|a| a.description.as_str());
    match effectiveness {
        Effectiveness::Working if current_errors > 0 => format!(
            "The current approach is working. Resolve the {current_errors} remaining error(s) and continue."
        ),
        Effectiveness::Working => "The current approach is working. Continue.".to_string(),
        Effectiveness::Struggling => match suggestion {
            Some(s) => format!(
                "Progress is slow with {current_errors} current error(s). Consider: {s}."
            ),
            None => format!(
                "Progress is slow with {current_errors} current error(s). Simplify the next step."
            ),
        },
        Effectiveness::Stuck => match suggestion {
            Some(s) => format!("No progress is being made. Switch strategy: {s}."),
            None => "No progress is being made. Switch strategy.".to_string(),
        },
        Effectiveness::WrongDirection => match suggestion {
            Some(s) => format!("The approach is moving away from the goal. Stop and {}.", lowercase_first(s)),
            None => "The approach is moving away from the goal. Stop and rethink it.".to_string(),
        },
    }
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

//! Approach evaluation output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AlternativeId, TaskId};

/// Qualitative judgment of the current strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effectiveness {
    Working,
    Struggling,
    Stuck,
    WrongDirection,
}

impl Effectiveness {
    pub fn as_str(self) -> &'static str {
        match self {
            Effectiveness::Working => "working",
            Effectiveness::Struggling => "struggling",
            Effectiveness::Stuck => "stuck",
            Effectiveness::WrongDirection => "wrong_direction",
        }
    }

    /// Stuck or heading the wrong way.
    pub fn is_failing(self) -> bool {
        matches!(self, Effectiveness::Stuck | Effectiveness::WrongDirection)
    }
}

impl std::fmt::Display for Effectiveness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeApproach {
    pub id: AlternativeId,
    pub description: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub estimated_effort_minutes: f64,
    pub confidence: f64,
    pub required_changes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproachAssessment {
    pub task_id: TaskId,
    pub current_approach: String,
    pub effectiveness: Effectiveness,
    pub confidence: f64,
    /// Ranked by confidence, at most three.
    pub alternatives: Vec<AlternativeApproach>,
    pub recommendation: String,
    pub timestamp: DateTime<Utc>,
}

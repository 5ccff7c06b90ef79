//! Combined next-step decision.

use serde::{Deserialize, Serialize};

use super::approach::ApproachAssessment;
use super::blocker::BlockerAssessment;
use super::progress::ProgressAssessment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Continue,
    TryAlternative,
    RequestHelp,
    SplitTask,
    Abort,
}

impl RecommendedAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendedAction::Continue => "continue",
            RecommendedAction::TryAlternative => "try_alternative",
            RecommendedAction::RequestHelp => "request_help",
            RecommendedAction::SplitTask => "split_task",
            RecommendedAction::Abort => "abort",
        }
    }
}

impl std::fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: RecommendedAction,
    pub reason: String,
    pub details: String,
    pub confidence: f64,
    /// 1 (highest) to 5.
    pub priority: u8,
}

/// All three assessments plus the recommendation derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullAssessment {
    pub progress: ProgressAssessment,
    pub blockers: BlockerAssessment,
    pub approach: ApproachAssessment,
    pub recommendation: Recommendation,
}

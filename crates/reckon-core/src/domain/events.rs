//! Events - エンジンが通知するドメインイベント
//!
//! One variant per observer hook. A host process forwards these onto its own
//! event bus; see [`BroadcastObserver`](crate::impls::BroadcastObserver).

use serde::{Deserialize, Serialize};

use super::approach::ApproachAssessment;
use super::blocker::BlockerAssessment;
use super::ids::TaskId;
use super::outcome::TaskOutcome;
use super::progress::ProgressAssessment;
use super::recommendation::Recommendation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AssessmentEvent {
    ProgressAssessed {
        task_id: TaskId,
        assessment: ProgressAssessment,
    },
    BlockersDetected {
        task_id: TaskId,
        assessment: BlockerAssessment,
    },
    ApproachEvaluated {
        task_id: TaskId,
        assessment: ApproachAssessment,
    },
    Recommendation {
        task_id: TaskId,
        recommendation: Recommendation,
    },
    OutcomeRecorded {
        task_id: TaskId,
        outcome: TaskOutcome,
    },
}

impl AssessmentEvent {
    pub fn task_id(&self) -> &TaskId {
        match self {
            AssessmentEvent::ProgressAssessed { task_id, .. }
            | AssessmentEvent::BlockersDetected { task_id, .. }
            | AssessmentEvent::ApproachEvaluated { task_id, .. }
            | AssessmentEvent::Recommendation { task_id, .. }
            | AssessmentEvent::OutcomeRecorded { task_id, .. } => task_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AssessmentEvent::ProgressAssessed { .. } => "progress_assessed",
            AssessmentEvent::BlockersDetected { .. } => "blockers_detected",
            AssessmentEvent::ApproachEvaluated { .. } => "approach_evaluated",
            AssessmentEvent::Recommendation { .. } => "recommendation",
            AssessmentEvent::OutcomeRecorded { .. } => "outcome_recorded",
        }
    }
}

//! AssessmentObserver port - エンジンからの通知
//!
//! Each hook runs synchronously right after the matching cache write (or
//! outcome record). All hooks default to no-ops so an observer only
//! implements what it cares about.

use crate::domain::{
    ApproachAssessment, BlockerAssessment, ProgressAssessment, Recommendation, TaskId,
    TaskOutcome,
};

pub trait AssessmentObserver: Send + Sync {
    fn on_progress_assessed(&self, _task_id: &TaskId, _assessment: &ProgressAssessment) {}

    fn on_blockers_detected(&self, _task_id: &TaskId, _assessment: &BlockerAssessment) {}

    fn on_approach_evaluated(&self, _task_id: &TaskId, _assessment: &ApproachAssessment) {}

    fn on_recommendation(&self, _task_id: &TaskId, _recommendation: &Recommendation) {}

    fn on_outcome_recorded(&self, _task_id: &TaskId, _outcome: &TaskOutcome) {}
}

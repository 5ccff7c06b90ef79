//! BroadcastObserver - observer フックを tokio broadcast チャネルへ流す
//!
//! This is the hand-off point for a host event bus: subscribe, then forward
//! [`AssessmentEvent`]s wherever they need to go. Sending never blocks; with
//! no subscribers the event is dropped.

use tokio::sync::broadcast;

use crate::domain::{
    ApproachAssessment, AssessmentEvent, BlockerAssessment, ProgressAssessment, Recommendation,
    TaskId, TaskOutcome,
};
use crate::ports::AssessmentObserver;

pub struct BroadcastObserver {
    tx: broadcast::Sender<AssessmentEvent>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AssessmentEvent> {
        self.tx.subscribe()
    }

    fn send(&self, event: AssessmentEvent) {
        // no receivers is fine
        let _ = self.tx.send(event);
    }
}

impl AssessmentObserver for BroadcastObserver {
    fn on_progress_assessed(&self, task_id: &TaskId, assessment: &ProgressAssessment) {
        self.send(AssessmentEvent::ProgressAssessed {
            task_id: task_id.clone(),
            assessment: assessment.clone(),
        });
    }

    fn on_blockers_detected(&self, task_id: &TaskId, assessment: &BlockerAssessment) {
        self.send(AssessmentEvent::BlockersDetected {
            task_id: task_id.clone(),
            assessment: assessment.clone(),
        });
    }

    fn on_approach_evaluated(&self, task_id: &TaskId, assessment: &ApproachAssessment) {
        self.send(AssessmentEvent::ApproachEvaluated {
            task_id: task_id.clone(),
            assessment: assessment.clone(),
        });
    }

    fn on_recommendation(&self, task_id: &TaskId, recommendation: &Recommendation) {
        self.send(AssessmentEvent::Recommendation {
            task_id: task_id.clone(),
            recommendation: recommendation.clone(),
        });
    }

    fn on_outcome_recorded(&self, task_id: &TaskId, outcome: &TaskOutcome) {
        self.send(AssessmentEvent::OutcomeRecorded {
            task_id: task_id.clone(),
            outcome: outcome.clone(),
        });
    }
}

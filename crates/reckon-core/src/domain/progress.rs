//! Progress assessment output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskType {
    Technical,
    Scope,
    Time,
    Quality,
}

/// An identified risk to completing the task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub risk_type: RiskType,
    pub description: String,
    pub probability: f64,
    pub impact: f64,
    /// Always `probability * impact`.
    pub risk_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
}

impl Risk {
    pub fn new(
        risk_type: RiskType,
        description: impl Into<String>,
        probability: f64,
        impact: f64,
    ) -> Self {
        let probability = probability.clamp(0.0, 1.0);
        let impact = impact.clamp(0.0, 1.0);
        Self {
            risk_type,
            description: description.into(),
            probability,
            impact,
            risk_score: probability * impact,
            mitigation: None,
        }
    }

    pub fn with_mitigation(mut self, mitigation: impl Into<String>) -> Self {
        self.mitigation = Some(mitigation.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressAssessment {
    pub task_id: TaskId,
    /// In `[0, 1]`; below 0.9 whenever current errors exist.
    pub completion_estimate: f64,
    pub confidence: f64,
    pub remaining_work: Vec<String>,
    pub completed_work: Vec<String>,
    pub blockers: Vec<String>,
    pub risks: Vec<Risk>,
    pub estimated_remaining_ms: u64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_score_is_probability_times_impact() {
        let risk = Risk::new(RiskType::Time, "late", 0.5, 0.8);
        assert!((risk.risk_score - 0.4).abs() < 1e-9);

        let clamped = Risk::new(RiskType::Scope, "huge", 1.7, 0.5);
        assert_eq!(clamped.probability, 1.0);
    }
}

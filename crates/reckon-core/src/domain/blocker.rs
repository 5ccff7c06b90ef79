//! Blocker detection output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{BlockerId, TaskId};
use super::trend::TrendDirection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockerType {
    Technical,
    Dependency,
    UnclearRequirement,
    External,
    KnowledgeGap,
}

impl BlockerType {
    /// Weight used by the overall severity average.
    pub fn weight(self) -> f64 {
        match self {
            BlockerType::Technical => 2.0,
            BlockerType::Dependency => 3.0,
            BlockerType::UnclearRequirement => 4.0,
            BlockerType::External => 2.0,
            BlockerType::KnowledgeGap => 2.0,
        }
    }
}

/// Ordered: `None < Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockerSeverity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl BlockerSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockerSeverity::None => "none",
            BlockerSeverity::Low => "low",
            BlockerSeverity::Medium => "medium",
            BlockerSeverity::High => "high",
            BlockerSeverity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for BlockerSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blocker {
    pub id: BlockerId,
    pub blocker_type: BlockerType,
    pub description: String,
    pub severity: BlockerSeverity,
    pub affected_files: Vec<String>,
    pub possible_solutions: Vec<String>,
    pub needs_human: bool,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockerAssessment {
    pub task_id: TaskId,
    pub blockers: Vec<Blocker>,
    pub severity: BlockerSeverity,
    pub can_proceed: bool,
    pub suggested_actions: Vec<String>,
    pub error_trend: TrendDirection,
    pub timestamp: DateTime<Utc>,
}

impl BlockerAssessment {
    pub fn has_human_blocker(&self) -> bool {
        self.blockers.iter().any(|b| b.needs_human)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_ordered() {
        assert!(BlockerSeverity::None < BlockerSeverity::Low);
        assert!(BlockerSeverity::High < BlockerSeverity::Critical);
        assert_eq!(
            BlockerSeverity::Medium.max(BlockerSeverity::High),
            BlockerSeverity::High
        );
    }

    #[test]
    fn blocker_type_serializes_snake_case() {
        let s = serde_json::to_string(&BlockerType::UnclearRequirement).unwrap();
        assert_eq!(s, "\"unclear_requirement\"");
    }
}

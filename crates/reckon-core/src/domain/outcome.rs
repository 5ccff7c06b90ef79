//! Outcome model: how a finished task went, and what history says about
//! tasks like it.
//!
//! `TaskOutcome` is the learner's only input and is append-only.
//! `HistoricalInsight` is always derived from stored outcomes; it is never
//! persisted on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::ValidationError;
use super::ids::TaskId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub success: bool,
    pub approach: String,
    pub iterations: u32,
    pub time_spent_ms: u64,
    #[serde(default)]
    pub blockers_encountered: Vec<String>,
    #[serde(default)]
    pub lessons_learned: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl TaskOutcome {
    pub fn new(
        task_id: impl Into<TaskId>,
        success: bool,
        approach: impl Into<String>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            success,
            approach: approach.into(),
            iterations: 0,
            time_spent_ms: 0,
            blockers_encountered: Vec::new(),
            lessons_learned: Vec::new(),
            completed_at,
        }
    }

    pub fn with_effort(mut self, iterations: u32, time_spent_ms: u64) -> Self {
        self.iterations = iterations;
        self.time_spent_ms = time_spent_ms;
        self
    }

    pub fn with_blockers<I, S>(mut self, blockers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blockers_encountered = blockers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_lessons<I, S>(mut self, lessons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lessons_learned = lessons.into_iter().map(Into::into).collect();
        self
    }

    pub fn time_spent_minutes(&self) -> f64 {
        self.time_spent_ms as f64 / 60_000.0
    }

    /// Check the invariants the type system cannot express.
    ///
    /// Fails on the first violated field, in declaration order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.task_id.is_blank() {
            return Err(ValidationError::new("task_id", "must not be empty"));
        }
        if self.approach.trim().is_empty() {
            return Err(ValidationError::new("approach", "must not be empty"));
        }
        if self.completed_at.timestamp() <= 0 {
            return Err(ValidationError::new(
                "completed_at",
                "must be a timestamp after the unix epoch",
            ));
        }
        Ok(())
    }

    /// Build an outcome from untyped JSON, naming the first malformed field.
    ///
    /// Negative counts and non-array blocker/lesson lists are reported here,
    /// before the typed checks of [`TaskOutcome::validate`] run.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ValidationError::new("outcome", "must be a JSON object"))?;

        let task_id = required_str(obj.get("task_id"), "task_id")?;
        let success = obj
            .get("success")
            .and_then(Value::as_bool)
            .ok_or_else(|| ValidationError::new("success", "must be a boolean"))?;
        let approach = required_str(obj.get("approach"), "approach")?;
        let iterations = non_negative(obj.get("iterations"), "iterations")?;
        let time_spent_ms = non_negative(obj.get("time_spent_ms"), "time_spent_ms")?;
        let blockers_encountered =
            string_array(obj.get("blockers_encountered"), "blockers_encountered")?;
        let lessons_learned = string_array(obj.get("lessons_learned"), "lessons_learned")?;
        let completed_at = obj
            .get("completed_at")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| ValidationError::new("completed_at", "must be an RFC 3339 timestamp"))?;

        let iterations = u32::try_from(iterations)
            .map_err(|_| ValidationError::new("iterations", "is out of range"))?;

        let outcome = Self {
            task_id: TaskId::new(task_id),
            success,
            approach: approach.to_string(),
            iterations,
            time_spent_ms,
            blockers_encountered,
            lessons_learned,
            completed_at,
        };
        outcome.validate()?;
        Ok(outcome)
    }
}

fn required_str<'a>(value: Option<&'a Value>, field: &'static str) -> Result<&'a str, ValidationError> {
    match value.and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        Some(_) => Err(ValidationError::new(field, "must not be empty")),
        None => Err(ValidationError::new(field, "is required and must be a string")),
    }
}

fn non_negative(value: Option<&Value>, field: &'static str) -> Result<u64, ValidationError> {
    let Some(value) = value else {
        return Err(ValidationError::new(field, "is required"));
    };
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(n) if n < 0.0 => Err(ValidationError::new(field, "must not be negative")),
        Some(n) if n.is_finite() => Ok(n.round() as u64),
        _ => Err(ValidationError::new(field, "must be a number")),
    }
}

fn string_array(value: Option<&Value>, field: &'static str) -> Result<Vec<String>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ValidationError::new(field, "must contain only strings"))
            })
            .collect(),
        Some(_) => Err(ValidationError::new(field, "must be an array")),
    }
}

/// Statistical summary for a task-type bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalInsight {
    pub pattern: String,
    pub task_type: String,
    pub success_rate: f64,
    pub average_iterations: f64,
    pub average_time_ms: f64,
    pub common_blockers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_approach: Option<String>,
    /// Things that went badly before for this kind of task.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub avoid: Vec<String>,
    pub sample_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn validate_rejects_blank_approach() {
        let outcome = TaskOutcome::new("t1", true, "   ", at());
        let err = outcome.validate().unwrap_err();
        assert_eq!(err.field, "approach");
    }

    #[test]
    fn validate_reports_task_id_before_approach() {
        let outcome = TaskOutcome::new("", true, "", at());
        assert_eq!(outcome.validate().unwrap_err().field, "task_id");
    }

    #[test]
    fn validate_rejects_epoch_timestamp() {
        let outcome = TaskOutcome::new("t1", true, "api", DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(outcome.validate().unwrap_err().field, "completed_at");
    }

    #[test]
    fn from_json_accepts_well_formed_outcome() {
        let v = json!({
            "task_id": "t1",
            "success": true,
            "approach": "feature flag rollout",
            "iterations": 4,
            "time_spent_ms": 120000,
            "blockers_encountered": ["flaky ci"],
            "lessons_learned": [],
            "completed_at": "2024-01-01T12:00:00Z"
        });
        let outcome = TaskOutcome::from_json(&v).unwrap();
        assert_eq!(outcome.iterations, 4);
        assert_eq!(outcome.time_spent_minutes(), 2.0);
        assert_eq!(outcome.blockers_encountered, vec!["flaky ci".to_string()]);
    }

    #[test]
    fn from_json_rejects_negative_iterations() {
        let v = json!({
            "task_id": "t1",
            "success": false,
            "approach": "api",
            "iterations": -1,
            "time_spent_ms": 0,
            "completed_at": "2024-01-01T12:00:00Z"
        });
        let err = TaskOutcome::from_json(&v).unwrap_err();
        assert_eq!(err.field, "iterations");
        assert!(err.reason.contains("negative"));
    }

    #[test]
    fn from_json_rejects_non_array_blockers() {
        let v = json!({
            "task_id": "t1",
            "success": false,
            "approach": "api",
            "iterations": 1,
            "time_spent_ms": 0,
            "blockers_encountered": "oops",
            "completed_at": "2024-01-01T12:00:00Z"
        });
        assert_eq!(
            TaskOutcome::from_json(&v).unwrap_err().field,
            "blockers_encountered"
        );
    }

    #[test]
    fn from_json_rejects_bad_timestamp() {
        let v = json!({
            "task_id": "t1",
            "success": true,
            "approach": "api",
            "iterations": 1,
            "time_spent_ms": 0,
            "completed_at": "yesterday"
        });
        assert_eq!(TaskOutcome::from_json(&v).unwrap_err().field, "completed_at");
    }
}

//! Assessment input: the running history of an in-progress task.
//!
//! Everything in here is produced by the external task executor and is read
//! only by this crate. A fresh [`AssessmentContext`] is supplied on every
//! top-level call.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// Severity reported by the executor for a single error.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// One error observed by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    #[serde(rename = "type")]
    pub error_type: String,

    #[serde(default)]
    pub severity: ErrorSeverity,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    /// Iteration in which the error was produced.
    #[serde(default)]
    pub iteration: u32,
}

impl ErrorEntry {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            severity: ErrorSeverity::default(),
            message: message.into(),
            file: None,
            line: None,
            iteration: 0,
        }
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn at_iteration(mut self, iteration: u32) -> Self {
        self.iteration = iteration;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A file touched during an iteration.
///
/// At the JSON boundary a change may also be written as a bare path string;
/// it is normalized to a `Modified` change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FileChangeRepr")]
pub struct FileChange {
    pub path: String,
    pub kind: FileChangeKind,
}

impl FileChange {
    pub fn modified(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FileChangeKind::Modified,
        }
    }

    pub fn created(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FileChangeKind::Created,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FileChangeRepr {
    Path(String),
    Full {
        path: String,
        #[serde(default = "default_change_kind", alias = "type")]
        kind: FileChangeKind,
    },
}

fn default_change_kind() -> FileChangeKind {
    FileChangeKind::Modified
}

impl From<FileChangeRepr> for FileChange {
    fn from(repr: FileChangeRepr) -> Self {
        match repr {
            FileChangeRepr::Path(path) => FileChange::modified(path),
            FileChangeRepr::Full { path, kind } => FileChange { path, kind },
        }
    }
}

/// One iteration of the executor loop. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationHistoryEntry {
    pub iteration: u32,

    #[serde(default)]
    pub phase: String,

    #[serde(default)]
    pub action: String,

    /// Older executors emit `changes`, test fixtures emit `filesModified`.
    #[serde(default, alias = "changes", alias = "filesModified")]
    pub files_touched: Vec<FileChange>,

    #[serde(default)]
    pub errors: Vec<ErrorEntry>,

    #[serde(default)]
    pub duration_ms: u64,

    pub timestamp: DateTime<Utc>,
}

impl IterationHistoryEntry {
    pub fn new(iteration: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            iteration,
            phase: String::new(),
            action: String::new(),
            files_touched: Vec::new(),
            errors: Vec::new(),
            duration_ms: 0,
            timestamp,
        }
    }

    pub fn with_action(mut self, phase: impl Into<String>, action: impl Into<String>) -> Self {
        self.phase = phase.into();
        self.action = action.into();
        self
    }

    pub fn with_files<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files_touched
            .extend(paths.into_iter().map(FileChange::modified));
        self
    }

    pub fn with_errors(mut self, errors: Vec<ErrorEntry>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Input to every assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentContext {
    pub task_id: TaskId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub expected_files: Vec<String>,

    #[serde(default)]
    pub acceptance_criteria: Vec<String>,

    #[serde(default)]
    pub iterations: Vec<IterationHistoryEntry>,

    #[serde(default)]
    pub current_errors: Vec<ErrorEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_feedback: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_diff: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl AssessmentContext {
    pub fn new(task_id: impl Into<TaskId>, name: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            name: name.into(),
            description: String::new(),
            expected_files: Vec::new(),
            acceptance_criteria: Vec::new(),
            iterations: Vec::new(),
            current_errors: Vec::new(),
            agent_feedback: None,
            code_diff: None,
            estimated_duration_ms: None,
            max_iterations: None,
            elapsed_ms: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_expected_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_acceptance_criteria<I, S>(mut self, criteria: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.acceptance_criteria = criteria.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_iterations(mut self, iterations: Vec<IterationHistoryEntry>) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_current_errors(mut self, errors: Vec<ErrorEntry>) -> Self {
        self.current_errors = errors;
        self
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.agent_feedback = Some(feedback.into());
        self
    }

    pub fn with_code_diff(mut self, diff: impl Into<String>) -> Self {
        self.code_diff = Some(diff.into());
        self
    }

    pub fn with_timing(mut self, estimated_ms: Option<u64>, elapsed_ms: Option<u64>) -> Self {
        self.estimated_duration_ms = estimated_ms;
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Error count per iteration, oldest first.
    pub fn error_counts(&self) -> Vec<f64> {
        self.iterations
            .iter()
            .map(|it| it.errors.len() as f64)
            .collect()
    }

    /// Every path touched across the iteration history.
    pub fn touched_paths(&self) -> BTreeSet<String> {
        self.iterations
            .iter()
            .flat_map(|it| it.files_touched.iter().map(|c| c.path.clone()))
            .collect()
    }

    /// elapsed / estimated, when both are known.
    pub fn time_ratio(&self) -> Option<f64> {
        match (self.elapsed_ms, self.estimated_duration_ms) {
            (Some(elapsed), Some(estimated)) if estimated > 0 => {
                Some(elapsed as f64 / estimated as f64)
            }
            _ => None,
        }
    }
}

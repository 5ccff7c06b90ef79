//! OutcomeStore port - 完了タスクの結果を保存する
//!
//! The learner only ever talks to this trait. The default backend is
//! [`InMemoryOutcomeStore`](crate::impls::InMemoryOutcomeStore); a durable
//! backend can be substituted without changing engine behavior. Errors from
//! a backend are returned to the caller unchanged.

use async_trait::async_trait;

use crate::domain::{StoreError, TaskOutcome};

#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Store one outcome. Listing order is most recent first.
    async fn save(&self, outcome: TaskOutcome) -> Result<(), StoreError>;

    async fn get_all(&self) -> Result<Vec<TaskOutcome>, StoreError>;

    /// Outcomes whose approach or task id contains `task_type`,
    /// case-insensitively.
    async fn get_by_type(&self, task_type: &str) -> Result<Vec<TaskOutcome>, StoreError>;

    /// Outcomes whose approach, task id, blockers or lessons mention any of
    /// the (lowercase) keywords.
    async fn search_by_keywords(&self, keywords: &[String]) -> Result<Vec<TaskOutcome>, StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;
}

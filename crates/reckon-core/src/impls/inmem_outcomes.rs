//! InMemoryOutcomeStore - 開発用・デフォルトの結果ストア
//!
//! Bounded, most-recent-first. Once `max_outcomes` is reached the oldest
//! outcome is dropped on every save.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{StoreError, TaskOutcome};
use crate::ports::OutcomeStore;

pub struct InMemoryOutcomeStore {
    outcomes: RwLock<VecDeque<TaskOutcome>>,
    max_outcomes: usize,
}

impl InMemoryOutcomeStore {
    pub fn new(max_outcomes: usize) -> Self {
        Self {
            outcomes: RwLock::new(VecDeque::new()),
            max_outcomes: max_outcomes.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.outcomes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.outcomes.read().await.is_empty()
    }
}

impl Default for InMemoryOutcomeStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

fn searchable_text(outcome: &TaskOutcome) -> String {
    let mut text = String::new();
    text.push_str(outcome.task_id.as_str());
    text.push(' ');
    text.push_str(&outcome.approach);
    for item in outcome
        .blockers_encountered
        .iter()
        .chain(outcome.lessons_learned.iter())
    {
        text.push(' ');
        text.push_str(item);
    }
    text.to_lowercase()
}

#[async_trait]
impl OutcomeStore for InMemoryOutcomeStore {
    async fn save(&self, outcome: TaskOutcome) -> Result<(), StoreError> {
        let mut outcomes = self.outcomes.write().await;
        outcomes.push_front(outcome);
        outcomes.truncate(self.max_outcomes);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<TaskOutcome>, StoreError> {
        Ok(self.outcomes.read().await.iter().cloned().collect())
    }

    async fn get_by_type(&self, task_type: &str) -> Result<Vec<TaskOutcome>, StoreError> {
        let needle = task_type.to_lowercase();
        let outcomes = self.outcomes.read().await;
        Ok(outcomes
            .iter()
            .filter(|o| {
                o.approach.to_lowercase().contains(&needle)
                    || o.task_id.as_str().to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn search_by_keywords(&self, keywords: &[String]) -> Result<Vec<TaskOutcome>, StoreError> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let outcomes = self.outcomes.read().await;
        Ok(outcomes
            .iter()
            .filter(|o| {
                let text = searchable_text(o);
                keywords.iter().any(|k| text.contains(k.as_str()))
            })
            .cloned()
            .collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.outcomes.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn outcome(id: &str, approach: &str) -> TaskOutcome {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        TaskOutcome::new(id, true, approach, at)
    }

    #[tokio::test]
    async fn save_keeps_most_recent_first_and_trims() {
        let store = InMemoryOutcomeStore::new(2);
        store.save(outcome("t1", "a")).await.unwrap();
        store.save(outcome("t2", "b")).await.unwrap();
        store.save(outcome("t3", "c")).await.unwrap();

        let all = store.get_all().await.unwrap();
        let ids: Vec<&str> = all.iter().map(|o| o.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t3", "t2"]);
    }

    #[tokio::test]
    async fn get_by_type_matches_approach_or_id_case_insensitively() {
        let store = InMemoryOutcomeStore::default();
        store.save(outcome("t1", "Build REST API")).await.unwrap();
        store.save(outcome("api-42", "something else")).await.unwrap();
        store.save(outcome("t3", "frontend")).await.unwrap();

        let found = store.get_by_type("API").await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn search_by_keywords_looks_at_lessons_and_blockers() {
        let store = InMemoryOutcomeStore::default();
        store
            .save(outcome("t1", "x").with_lessons(["pin the schema version"]))
            .await
            .unwrap();
        store.save(outcome("t2", "y")).await.unwrap();

        let found = store
            .search_by_keywords(&["schema".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(store.search_by_keywords(&[]).await.unwrap().is_empty());

        store.clear().await.unwrap();
        assert!(store.is_empty().await);
    }
}

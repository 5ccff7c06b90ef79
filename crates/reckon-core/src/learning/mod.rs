//! HistoricalLearner - 完了タスクからの学習
//!
//! Owns the outcome store and a per-task-type insight cache. Insights are
//! always derived from stored outcomes and are only cached, never stored.
//!
//! # キャッシュ無効化
//! Recording an outcome drops every cached insight whose key shares a
//! keyword with the outcome's approach, every key the outcome would match
//! by substring, and the `"all"` key.

pub mod insights;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cache::TtlCache;
use crate::domain::{HistoricalInsight, ReckonError, TaskCategory, TaskOutcome};
use crate::impls::StopWordExtractor;
use crate::ports::{Clock, KeywordExtractor, OutcomeStore};

pub const DEFAULT_MIN_SAMPLE_SIZE: usize = 3;
pub const ALL_KEY: &str = "all";
const INSIGHT_CACHE_KEYS: usize = 256;

/// Aggregate view over everything the learner has stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerStats {
    pub total_outcomes: usize,
    pub successes: usize,
    pub success_rate: f64,
    /// Outcome count per classified task category.
    pub by_task_type: BTreeMap<String, usize>,
}

pub struct HistoricalLearner {
    store: Arc<dyn OutcomeStore>,
    extractors: Vec<Arc<dyn KeywordExtractor>>,
    clock: Arc<dyn Clock>,
    min_sample_size: usize,
    insights: Mutex<TtlCache<String, Vec<HistoricalInsight>>>,
}

impl HistoricalLearner {
    pub fn new(store: Arc<dyn OutcomeStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            extractors: vec![Arc::new(StopWordExtractor::new())],
            clock,
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
            insights: Mutex::new(TtlCache::new(Duration::minutes(5), INSIGHT_CACHE_KEYS)),
        }
    }

    /// Replace the default keyword extractor. An empty list keeps the default.
    pub fn with_extractors(mut self, extractors: Vec<Arc<dyn KeywordExtractor>>) -> Self {
        if !extractors.is_empty() {
            self.extractors = extractors;
        }
        self
    }

    pub fn with_min_sample_size(mut self, min_sample_size: usize) -> Self {
        self.min_sample_size = min_sample_size.max(1);
        self
    }

    pub fn with_insight_ttl(mut self, ttl: Duration) -> Self {
        self.insights = Mutex::new(TtlCache::new(ttl, INSIGHT_CACHE_KEYS));
        self
    }

    pub fn min_sample_size(&self) -> usize {
        self.min_sample_size
    }

    /// Union of every extractor's keywords.
    pub fn keywords(&self, text: &str) -> BTreeSet<String> {
        self.extractors
            .iter()
            .flat_map(|e| e.extract(text))
            .collect()
    }

    /// Validate and store an outcome, then drop the insights it affects.
    pub async fn record_outcome(&self, outcome: TaskOutcome) -> Result<(), ReckonError> {
        outcome.validate()?;

        let approach_keywords = self.keywords(&outcome.approach);
        let haystack = format!("{} {}", outcome.task_id, outcome.approach).to_lowercase();
        let task_id = outcome.task_id.clone();
        self.store.save(outcome).await?;

        let mut cache = self.insights.lock().await;
        let before = cache.len();
        cache.retain(|key| {
            let affected = key == ALL_KEY
                || haystack.contains(key.as_str())
                || !self.keywords(key).is_disjoint(&approach_keywords);
            !affected
        });
        info!(
            task_id = %task_id,
            invalidated = before - cache.len(),
            "outcome recorded"
        );
        Ok(())
    }

    /// Insights for outcomes whose approach or id contains `task_type`.
    ///
    /// `"all"` covers every stored outcome.
    pub async fn get_insights(&self, task_type: &str) -> Result<Vec<HistoricalInsight>, ReckonError> {
        let key = task_type.trim().to_lowercase();
        let now = self.clock.now();

        let version = {
            let cache = self.insights.lock().await;
            if let Some(hit) = cache.get(&key, now) {
                debug!(task_type = %key, "insight cache hit");
                return Ok(hit);
            }
            cache.version()
        };

        let outcomes = if key == ALL_KEY {
            self.store.get_all().await?
        } else {
            self.store.get_by_type(&key).await?
        };
        let generated = insights::generate(&key, &outcomes, self.min_sample_size);
        debug!(
            task_type = %key,
            outcomes = outcomes.len(),
            insights = generated.len(),
            "insights generated"
        );

        // empty results are cached too; a related outcome drops them
        self.insights
            .lock()
            .await
            .insert_if_unchanged(key, generated.clone(), version, now);
        Ok(generated)
    }

    /// Stored outcomes sharing keywords with `description`, most similar
    /// first (Jaccard similarity of keyword sets).
    pub async fn find_similar_tasks(&self, description: &str) -> Result<Vec<TaskOutcome>, ReckonError> {
        let wanted = self.keywords(description);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        let query: Vec<String> = wanted.iter().cloned().collect();
        let candidates = self.store.search_by_keywords(&query).await?;

        let mut scored: Vec<(f64, TaskOutcome)> = candidates
            .into_iter()
            .map(|outcome| {
                let theirs = self.keywords(&outcome_text(&outcome));
                (jaccard(&wanted, &theirs), outcome)
            })
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored.into_iter().map(|(_, o)| o).collect())
    }

    pub fn classify_task_type(&self, description: &str) -> TaskCategory {
        TaskCategory::classify(description)
    }

    pub async fn statistics(&self) -> Result<LearnerStats, ReckonError> {
        let outcomes = self.store.get_all().await?;
        let total_outcomes = outcomes.len();
        let successes = outcomes.iter().filter(|o| o.success).count();
        let mut by_task_type = BTreeMap::new();
        for outcome in &outcomes {
            *by_task_type
                .entry(TaskCategory::classify(&outcome.approach).to_string())
                .or_insert(0) += 1;
        }
        Ok(LearnerStats {
            total_outcomes,
            successes,
            success_rate: if total_outcomes == 0 {
                0.0
            } else {
                successes as f64 / total_outcomes as f64
            },
            by_task_type,
        })
    }

    pub async fn clear_insight_cache(&self) {
        self.insights.lock().await.clear();
    }
}

fn outcome_text(outcome: &TaskOutcome) -> String {
    let mut text = outcome.approach.clone();
    for item in outcome
        .blockers_encountered
        .iter()
        .chain(outcome.lessons_learned.iter())
    {
        text.push(' ');
        text.push_str(item);
    }
    text
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StoreError;
    use crate::impls::InMemoryOutcomeStore;
    use crate::ports::FixedClock;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn outcome(id: &str, approach: &str, success: bool, iterations: u32) -> TaskOutcome {
        TaskOutcome::new(id, success, approach, t0()).with_effort(iterations, 600_000)
    }

    /// Counts store queries so cache hits can be observed.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryOutcomeStore,
        queries: AtomicUsize,
    }

    #[async_trait]
    impl OutcomeStore for CountingStore {
        async fn save(&self, outcome: TaskOutcome) -> Result<(), StoreError> {
            self.inner.save(outcome).await
        }

        async fn get_all(&self) -> Result<Vec<TaskOutcome>, StoreError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.inner.get_all().await
        }

        async fn get_by_type(&self, task_type: &str) -> Result<Vec<TaskOutcome>, StoreError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.inner.get_by_type(task_type).await
        }

        async fn search_by_keywords(&self, keywords: &[String]) -> Result<Vec<TaskOutcome>, StoreError> {
            self.inner.search_by_keywords(keywords).await
        }

        async fn clear(&self) -> Result<(), StoreError> {
            self.inner.clear().await
        }
    }

    struct DownStore;

    #[async_trait]
    impl OutcomeStore for DownStore {
        async fn save(&self, _outcome: TaskOutcome) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }

        async fn get_all(&self) -> Result<Vec<TaskOutcome>, StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }

        async fn get_by_type(&self, _task_type: &str) -> Result<Vec<TaskOutcome>, StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }

        async fn search_by_keywords(&self, _keywords: &[String]) -> Result<Vec<TaskOutcome>, StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }

        async fn clear(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn learner_with(store: Arc<dyn OutcomeStore>) -> (HistoricalLearner, FixedClock) {
        let clock = FixedClock::new(t0());
        (HistoricalLearner::new(store, Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn insights_need_minimum_sample() {
        let (learner, _) = learner_with(Arc::new(InMemoryOutcomeStore::default()));
        learner.record_outcome(outcome("t1", "feature", true, 3)).await.unwrap();
        learner.record_outcome(outcome("t2", "feature", true, 3)).await.unwrap();
        assert!(learner.get_insights("feature").await.unwrap().is_empty());

        learner.record_outcome(outcome("t3", "feature", false, 3)).await.unwrap();
        let insights = learner.get_insights("feature").await.unwrap();
        assert_eq!(insights[0].pattern, "Overall pattern for feature tasks");
    }

    #[tokio::test]
    async fn success_rate_of_mixed_outcomes() {
        let (learner, _) = learner_with(Arc::new(InMemoryOutcomeStore::default()));
        for (id, success) in [("t1", true), ("t2", false), ("t3", true)] {
            learner.record_outcome(outcome(id, "feature", success, 5)).await.unwrap();
        }
        let insights = learner.get_insights("feature").await.unwrap();
        assert!((insights[0].success_rate - 0.667).abs() < 0.01);
    }

    #[tokio::test]
    async fn average_iterations_of_api_outcomes() {
        let (learner, _) = learner_with(Arc::new(InMemoryOutcomeStore::default()));
        for (id, iterations) in [("t1", 4), ("t2", 6), ("t3", 8)] {
            learner.record_outcome(outcome(id, "api", true, iterations)).await.unwrap();
        }
        let insights = learner.get_insights("api").await.unwrap();
        assert_eq!(insights[0].average_iterations, 6.0);
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let store = Arc::new(CountingStore::default());
        let (learner, clock) = learner_with(store.clone());
        for id in ["t1", "t2", "t3"] {
            learner.record_outcome(outcome(id, "api", true, 2)).await.unwrap();
        }

        let first = learner.get_insights("api").await.unwrap();
        let second = learner.get_insights("api").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.queries.load(Ordering::SeqCst), 1);

        clock.advance(Duration::minutes(6));
        learner.get_insights("api").await.unwrap();
        assert_eq!(store.queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_insights_are_cached_until_a_related_outcome() {
        let store = Arc::new(CountingStore::default());
        let (learner, _) = learner_with(store.clone());
        learner.record_outcome(outcome("t1", "api", true, 2)).await.unwrap();

        assert!(learner.get_insights("api").await.unwrap().is_empty());
        assert!(learner.get_insights("api").await.unwrap().is_empty());
        assert_eq!(store.queries.load(Ordering::SeqCst), 1);

        learner.record_outcome(outcome("t2", "api", true, 2)).await.unwrap();
        learner.record_outcome(outcome("t3", "api", false, 2)).await.unwrap();
        let insights = learner.get_insights("api").await.unwrap();
        assert_eq!(store.queries.load(Ordering::SeqCst), 2);
        assert_eq!(insights[0].sample_size, 3);
    }

    #[tokio::test]
    async fn related_outcome_invalidates_cached_insights() {
        let store = Arc::new(CountingStore::default());
        let (learner, _) = learner_with(store.clone());
        for id in ["t1", "t2", "t3"] {
            learner.record_outcome(outcome(id, "api", true, 2)).await.unwrap();
        }
        learner.get_insights("api").await.unwrap();

        learner.record_outcome(outcome("t4", "rest api", false, 9)).await.unwrap();
        let insights = learner.get_insights("api").await.unwrap();
        assert_eq!(store.queries.load(Ordering::SeqCst), 2);
        assert_eq!(insights[0].sample_size, 4);
    }

    #[tokio::test]
    async fn unrelated_outcome_keeps_cache() {
        let store = Arc::new(CountingStore::default());
        let (learner, _) = learner_with(store.clone());
        for id in ["t1", "t2", "t3"] {
            learner.record_outcome(outcome(id, "api", true, 2)).await.unwrap();
        }
        learner.get_insights("api").await.unwrap();
        learner.record_outcome(outcome("t9", "frontend styling", true, 2)).await.unwrap();
        learner.get_insights("api").await.unwrap();
        assert_eq!(store.queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_outcome_names_the_field() {
        let (learner, _) = learner_with(Arc::new(InMemoryOutcomeStore::default()));
        let err = learner
            .record_outcome(outcome("t1", "", true, 1))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("approach"));
    }

    #[tokio::test]
    async fn storage_errors_propagate() {
        let (learner, _) = learner_with(Arc::new(DownStore));
        let err = learner
            .record_outcome(outcome("t1", "api", true, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ReckonError::Storage(StoreError::Unavailable(_))));
        assert!(learner.get_insights("api").await.is_err());
    }

    #[tokio::test]
    async fn similar_tasks_require_keyword_overlap() {
        let (learner, _) = learner_with(Arc::new(InMemoryOutcomeStore::default()));
        learner
            .record_outcome(outcome("t1", "database migration", true, 2))
            .await
            .unwrap();
        assert!(learner.find_similar_tasks("frontend styling").await.unwrap().is_empty());

        learner
            .record_outcome(outcome("t2", "database index tuning", true, 2))
            .await
            .unwrap();
        let similar = learner.find_similar_tasks("database migration").await.unwrap();
        assert_eq!(similar.len(), 2);
        assert_eq!(similar[0].task_id.as_str(), "t1");
    }

    #[tokio::test]
    async fn statistics_classify_stored_approaches() {
        let (learner, _) = learner_with(Arc::new(InMemoryOutcomeStore::default()));
        learner.record_outcome(outcome("t1", "database migration", true, 2)).await.unwrap();
        learner.record_outcome(outcome("t2", "fix login crash", false, 2)).await.unwrap();
        let stats = learner.statistics().await.unwrap();
        assert_eq!(stats.total_outcomes, 2);
        assert_eq!(stats.success_rate, 0.5);
        assert_eq!(stats.by_task_type.get("backend"), Some(&1));
        assert_eq!(stats.by_task_type.get("bugfix"), Some(&1));
    }
}

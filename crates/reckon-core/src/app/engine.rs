//! SelfAssessmentEngine - 評価コンポーネントのオーケストレーション
//!
//! # 責務
//! - 三つの評価器への委譲と、タスク単位の TTL キャッシュ
//! - タスクごとの「最後のコンテキスト」の保持
//! - 結果の統合（[`combine`](super::combine)）と observer への通知
//! - 完了結果の記録と、そのタスクのキャッシュ無効化
//!
//! # 並行性
//! Locks are only held to read or write a map entry, never while an
//! assessment is computed, so requests for different tasks do not wait on
//! each other. Writes go through the cache's invalidation token: an
//! assessment computed before `record_outcome` invalidated its task is
//! returned to its caller but never cached.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::analysis::{ApproachEvaluator, BlockerDetector, BlockerPattern, ProgressAssessor};
use crate::cache::{AssessmentCache, AssessmentKind, CachedAssessment, PutResult};
use crate::domain::{
    AlternativeApproach, ApproachAssessment, AssessmentContext, BlockerAssessment,
    FullAssessment, HistoricalInsight, ProgressAssessment, ReckonError, Recommendation,
    TaskCategory, TaskId, TaskOutcome,
};
use crate::learning::{HistoricalLearner, LearnerStats};
use crate::ports::{AssessmentObserver, Clock, IdGenerator};

use super::builder::EngineBuilder;
use super::combine;
use super::config::CacheConfig;
use super::status::CacheStats;

pub struct SelfAssessmentEngine {
    progress: ProgressAssessor,
    detector: BlockerDetector,
    evaluator: ApproachEvaluator,
    learner: HistoricalLearner,
    cache: RwLock<AssessmentCache>,
    contexts: RwLock<HashMap<TaskId, AssessmentContext>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    observer: Option<Arc<dyn AssessmentObserver>>,
}

impl SelfAssessmentEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        progress: ProgressAssessor,
        detector: BlockerDetector,
        evaluator: ApproachEvaluator,
        learner: HistoricalLearner,
        cache: &CacheConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        observer: Option<Arc<dyn AssessmentObserver>>,
    ) -> Self {
        Self {
            progress,
            detector,
            evaluator,
            learner,
            cache: RwLock::new(AssessmentCache::new(cache.ttls(), cache.max_tasks)),
            contexts: RwLock::new(HashMap::new()),
            clock,
            ids,
            observer,
        }
    }

    pub fn learner(&self) -> &HistoricalLearner {
        &self.learner
    }

    pub fn blocker_patterns(&self) -> &[BlockerPattern] {
        self.detector.patterns()
    }

    pub async fn last_context(&self, task_id: &TaskId) -> Option<AssessmentContext> {
        self.contexts.read().await.get(task_id).cloned()
    }

    // ------------------------------------------------------------------
    // 評価
    // ------------------------------------------------------------------

    pub async fn assess_progress(
        &self,
        task_id: &TaskId,
        ctx: AssessmentContext,
    ) -> ProgressAssessment {
        let ctx = self.remember(task_id, ctx).await;
        self.progress_for(task_id, &ctx).await
    }

    pub async fn assess_blockers(
        &self,
        task_id: &TaskId,
        ctx: AssessmentContext,
    ) -> BlockerAssessment {
        let ctx = self.remember(task_id, ctx).await;
        self.blockers_for(task_id, &ctx).await
    }

    pub async fn assess_approach(
        &self,
        task_id: &TaskId,
        ctx: AssessmentContext,
    ) -> ApproachAssessment {
        let ctx = self.remember(task_id, ctx).await;
        self.approach_for(task_id, &ctx).await
    }

    /// All three assessments, run concurrently, plus the combined
    /// recommendation.
    pub async fn get_full_assessment(
        &self,
        task_id: &TaskId,
        ctx: AssessmentContext,
    ) -> FullAssessment {
        let ctx = self.remember(task_id, ctx).await;
        self.full_for(task_id, &ctx).await
    }

    /// Recommendation from the last context seen for the task.
    ///
    /// Without one this is a low-confidence `continue`, not an error.
    pub async fn recommend_next_step(&self, task_id: &TaskId) -> Recommendation {
        match self.last_context(task_id).await {
            Some(ctx) => self.full_for(task_id, &ctx).await.recommendation,
            None => {
                debug!(task_id = %task_id, "no context for recommendation");
                let recommendation = combine::without_context();
                self.notify(|o| o.on_recommendation(task_id, &recommendation));
                recommendation
            }
        }
    }

    /// Ranked alternatives for the last known context; empty without one.
    pub async fn get_alternatives(&self, task_id: &TaskId) -> Vec<AlternativeApproach> {
        match self.last_context(task_id).await {
            Some(ctx) => self.approach_for(task_id, &ctx).await.alternatives,
            None => Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // 学習
    // ------------------------------------------------------------------

    /// Store the outcome, then drop everything cached for its task.
    ///
    /// The invalidation has completed when this returns. A rejected
    /// outcome leaves the caches untouched.
    pub async fn record_outcome(&self, outcome: TaskOutcome) -> Result<(), ReckonError> {
        let task_id = outcome.task_id.clone();
        self.learner.record_outcome(outcome.clone()).await?;

        self.cache.write().await.invalidate(&task_id);
        self.contexts.write().await.remove(&task_id);

        info!(task_id = %task_id, success = outcome.success, "task caches invalidated after outcome");
        self.notify(|o| o.on_outcome_recorded(&task_id, &outcome));
        Ok(())
    }

    pub async fn get_historical_insights(
        &self,
        task_type: &str,
    ) -> Result<Vec<HistoricalInsight>, ReckonError> {
        self.learner.get_insights(task_type).await
    }

    pub async fn find_similar_tasks(&self, description: &str) -> Result<Vec<TaskOutcome>, ReckonError> {
        self.learner.find_similar_tasks(description).await
    }

    pub fn classify_task_type(&self, description: &str) -> TaskCategory {
        self.learner.classify_task_type(description)
    }

    pub async fn learner_statistics(&self) -> Result<LearnerStats, ReckonError> {
        self.learner.statistics().await
    }

    // ------------------------------------------------------------------
    // キャッシュ管理
    // ------------------------------------------------------------------

    /// Forget cached assessments and the last context of one task.
    pub async fn clear_cache(&self, task_id: &TaskId) {
        self.cache.write().await.invalidate(task_id);
        self.contexts.write().await.remove(task_id);
    }

    /// Forget everything cached, insights included. Stored outcomes stay.
    pub async fn clear_all_caches(&self) {
        self.cache.write().await.clear();
        self.contexts.write().await.clear();
        self.learner.clear_insight_cache().await;
        info!("all caches cleared");
    }

    pub async fn cache_stats(&self) -> CacheStats {
        let (tasks, progress_entries, blocker_entries, approach_entries) = {
            let cache = self.cache.read().await;
            (
                cache.task_count(),
                cache.count(AssessmentKind::Progress),
                cache.count(AssessmentKind::Blockers),
                cache.count(AssessmentKind::Approach),
            )
        };
        CacheStats {
            tasks,
            progress_entries,
            blocker_entries,
            approach_entries,
            last_contexts: self.contexts.read().await.len(),
        }
    }

    // ------------------------------------------------------------------
    // 内部
    // ------------------------------------------------------------------

    async fn remember(&self, task_id: &TaskId, mut ctx: AssessmentContext) -> AssessmentContext {
        if ctx.task_id != *task_id {
            warn!(
                task_id = %task_id,
                context_task_id = %ctx.task_id,
                "context names a different task; using the requested id"
            );
            ctx.task_id = task_id.clone();
        }
        self.contexts.write().await.insert(task_id.clone(), ctx.clone());
        ctx
    }

    async fn full_for(&self, task_id: &TaskId, ctx: &AssessmentContext) -> FullAssessment {
        let (progress, blockers, approach) = tokio::join!(
            self.progress_for(task_id, ctx),
            self.blockers_for(task_id, ctx),
            self.approach_for(task_id, ctx),
        );
        let recommendation = combine::combine(&progress, &blockers, &approach);

        info!(
            task_id = %task_id,
            action = %recommendation.action,
            priority = recommendation.priority,
            completion = progress.completion_estimate,
            severity = %blockers.severity,
            effectiveness = %approach.effectiveness,
            "next step recommended"
        );
        self.notify(|o| o.on_recommendation(task_id, &recommendation));

        FullAssessment {
            progress,
            blockers,
            approach,
            recommendation,
        }
    }

    async fn progress_for(&self, task_id: &TaskId, ctx: &AssessmentContext) -> ProgressAssessment {
        let (assessment, stored) = self
            .cached(task_id, ctx, |ctx, now| self.progress.assess(ctx, now))
            .await;
        if stored {
            self.notify(|o| o.on_progress_assessed(task_id, &assessment));
        }
        assessment
    }

    async fn blockers_for(&self, task_id: &TaskId, ctx: &AssessmentContext) -> BlockerAssessment {
        let (assessment, stored) = self
            .cached(task_id, ctx, |ctx, now| {
                self.detector.detect(ctx, self.ids.as_ref(), now)
            })
            .await;
        if stored {
            self.notify(|o| o.on_blockers_detected(task_id, &assessment));
        }
        assessment
    }

    async fn approach_for(&self, task_id: &TaskId, ctx: &AssessmentContext) -> ApproachAssessment {
        let (assessment, stored) = self
            .cached(task_id, ctx, |ctx, now| {
                self.evaluator.evaluate(ctx, self.ids.as_ref(), now)
            })
            .await;
        if stored {
            self.notify(|o| o.on_approach_evaluated(task_id, &assessment));
        }
        assessment
    }

    /// Fresh cached value, or compute and store one. The flag is true when
    /// a newly computed value was written to the cache.
    async fn cached<T, F>(&self, task_id: &TaskId, ctx: &AssessmentContext, compute: F) -> (T, bool)
    where
        T: CachedAssessment,
        F: FnOnce(&AssessmentContext, DateTime<Utc>) -> T,
    {
        let now = self.clock.now();
        let token = {
            let cache = self.cache.read().await;
            if let Some(hit) = cache.get::<T>(task_id, now) {
                debug!(task_id = %task_id, kind = T::KIND.as_str(), "assessment cache hit");
                return (hit, false);
            }
            cache.token()
        };

        let value = compute(ctx, now);

        let put = self
            .cache
            .write()
            .await
            .put(task_id, value.clone(), token, now);
        match put {
            PutResult::Stored { evicted } => {
                if let Some(evicted) = evicted {
                    self.contexts.write().await.remove(&evicted);
                    debug!(evicted = %evicted, "task evicted from assessment cache");
                }
                (value, true)
            }
            PutResult::Stale => {
                debug!(
                    task_id = %task_id,
                    kind = T::KIND.as_str(),
                    "task invalidated during assessment; result not cached"
                );
                (value, false)
            }
        }
    }

    fn notify(&self, hook: impl FnOnce(&dyn AssessmentObserver)) {
        if let Some(observer) = &self.observer {
            hook(observer.as_ref());
        }
    }
}

//! AssessmentCache - タスクごとの評価キャッシュ
//!
//! One entry per task with three independently expiring slots. The task map
//! is bounded; when full, the task inserted first is evicted wholesale.
//!
//! # 無効化の順序
//! Writers take a [`token`](AssessmentCache::token) before computing and
//! hand it back to [`put`](AssessmentCache::put). A task invalidated after
//! the token was taken refuses the write, so an assessment computed from
//! pre-outcome state never lands after the outcome's invalidation.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use super::ttl::Stamped;
use crate::domain::{ApproachAssessment, BlockerAssessment, ProgressAssessment, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssessmentKind {
    Progress,
    Blockers,
    Approach,
}

impl AssessmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssessmentKind::Progress => "progress",
            AssessmentKind::Blockers => "blockers",
            AssessmentKind::Approach => "approach",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub progress: Duration,
    pub blockers: Duration,
    pub approach: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            progress: Duration::minutes(5),
            blockers: Duration::minutes(2),
            approach: Duration::minutes(5),
        }
    }
}

impl CacheTtls {
    pub fn for_kind(&self, kind: AssessmentKind) -> Duration {
        match kind {
            AssessmentKind::Progress => self.progress,
            AssessmentKind::Blockers => self.blockers,
            AssessmentKind::Approach => self.approach,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskEntry {
    /// Counter value of the last invalidation that touched this task.
    invalidated_at: u64,
    progress: Option<Stamped<ProgressAssessment>>,
    blockers: Option<Stamped<BlockerAssessment>>,
    approach: Option<Stamped<ApproachAssessment>>,
}

impl TaskEntry {
    fn is_empty(&self) -> bool {
        self.progress.is_none() && self.blockers.is_none() && self.approach.is_none()
    }
}

/// An assessment type that has a slot in [`TaskEntry`].
pub trait CachedAssessment: Clone + Send + Sync + 'static {
    const KIND: AssessmentKind;

    fn slot(entry: &TaskEntry) -> &Option<Stamped<Self>>;

    fn slot_mut(entry: &mut TaskEntry) -> &mut Option<Stamped<Self>>;
}

impl CachedAssessment for ProgressAssessment {
    const KIND: AssessmentKind = AssessmentKind::Progress;

    fn slot(entry: &TaskEntry) -> &Option<Stamped<Self>> {
        &entry.progress
    }

    fn slot_mut(entry: &mut TaskEntry) -> &mut Option<Stamped<Self>> {
        &mut entry.progress
    }
}

impl CachedAssessment for BlockerAssessment {
    const KIND: AssessmentKind = AssessmentKind::Blockers;

    fn slot(entry: &TaskEntry) -> &Option<Stamped<Self>> {
        &entry.blockers
    }

    fn slot_mut(entry: &mut TaskEntry) -> &mut Option<Stamped<Self>> {
        &mut entry.blockers
    }
}

impl CachedAssessment for ApproachAssessment {
    const KIND: AssessmentKind = AssessmentKind::Approach;

    fn slot(entry: &TaskEntry) -> &Option<Stamped<Self>> {
        &entry.approach
    }

    fn slot_mut(entry: &mut TaskEntry) -> &mut Option<Stamped<Self>> {
        &mut entry.approach
    }
}

/// Outcome of a [`AssessmentCache::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutResult {
    Stored { evicted: Option<TaskId> },
    /// The task was invalidated after the token was taken.
    Stale,
}

#[derive(Debug)]
pub struct AssessmentCache {
    tasks: HashMap<TaskId, TaskEntry>,
    order: VecDeque<TaskId>,
    ttls: CacheTtls,
    max_tasks: usize,
    counter: u64,
    /// Highest invalidation counter among evicted or cleared tasks.
    forgotten_at: u64,
    /// Invalidations of tasks with no entry, oldest first.
    pending: VecDeque<(TaskId, u64)>,
}

impl AssessmentCache {
    pub fn new(ttls: CacheTtls, max_tasks: usize) -> Self {
        Self {
            tasks: HashMap::new(),
            order: VecDeque::new(),
            ttls,
            max_tasks: max_tasks.max(1),
            counter: 0,
            forgotten_at: 0,
            pending: VecDeque::new(),
        }
    }

    pub fn ttls(&self) -> &CacheTtls {
        &self.ttls
    }

    pub fn token(&self) -> u64 {
        self.counter
    }

    pub fn get<T: CachedAssessment>(&self, task_id: &TaskId, now: DateTime<Utc>) -> Option<T> {
        let ttl = self.ttls.for_kind(T::KIND);
        self.tasks
            .get(task_id)
            .and_then(|entry| T::slot(entry).as_ref())
            .filter(|stamped| stamped.is_fresh(ttl, now))
            .map(|stamped| stamped.value.clone())
    }

    pub fn put<T: CachedAssessment>(
        &mut self,
        task_id: &TaskId,
        value: T,
        token: u64,
        now: DateTime<Utc>,
    ) -> PutResult {
        let invalidated_at = match self.tasks.get(task_id) {
            Some(entry) => entry.invalidated_at,
            None => self.pending_at(task_id).max(self.forgotten_at),
        };
        if invalidated_at > token {
            return PutResult::Stale;
        }
        let evicted = self.ensure_entry(task_id);
        if let Some(entry) = self.tasks.get_mut(task_id) {
            *T::slot_mut(entry) = Some(Stamped::new(value, now));
        }
        PutResult::Stored { evicted }
    }

    /// Drop every slot for the task and refuse in-flight writes.
    ///
    /// An uncached task gets no entry, so invalidating it never evicts
    /// another task.
    pub fn invalidate(&mut self, task_id: &TaskId) {
        self.counter += 1;
        let counter = self.counter;
        if let Some(entry) = self.tasks.get_mut(task_id) {
            *entry = TaskEntry {
                invalidated_at: counter,
                ..TaskEntry::default()
            };
            return;
        }
        self.pending.retain(|(id, _)| id != task_id);
        if self.pending.len() >= self.max_tasks {
            if let Some((_, at)) = self.pending.pop_front() {
                self.forgotten_at = self.forgotten_at.max(at);
            }
        }
        self.pending.push_back((task_id.clone(), counter));
    }

    pub fn clear(&mut self) {
        self.counter += 1;
        self.forgotten_at = self.counter;
        self.tasks.clear();
        self.order.clear();
        self.pending.clear();
    }

    /// Number of tasks with at least one cached slot.
    pub fn task_count(&self) -> usize {
        self.tasks.values().filter(|e| !e.is_empty()).count()
    }

    /// Number of filled slots of one kind, fresh or not.
    pub fn count(&self, kind: AssessmentKind) -> usize {
        self.tasks
            .values()
            .filter(|e| match kind {
                AssessmentKind::Progress => e.progress.is_some(),
                AssessmentKind::Blockers => e.blockers.is_some(),
                AssessmentKind::Approach => e.approach.is_some(),
            })
            .count()
    }

    fn ensure_entry(&mut self, task_id: &TaskId) -> Option<TaskId> {
        if self.tasks.contains_key(task_id) {
            return None;
        }
        let mut evicted = None;
        if self.tasks.len() >= self.max_tasks {
            if let Some(oldest) = self.order.pop_front() {
                if let Some(entry) = self.tasks.remove(&oldest) {
                    self.forgotten_at = self.forgotten_at.max(entry.invalidated_at);
                }
                evicted = Some(oldest);
            }
        }
        let invalidated_at = self.pending_at(task_id).max(self.forgotten_at);
        self.pending.retain(|(id, _)| id != task_id);
        self.order.push_back(task_id.clone());
        self.tasks.insert(
            task_id.clone(),
            TaskEntry {
                invalidated_at,
                ..TaskEntry::default()
            },
        );
        evicted
    }

    fn pending_at(&self, task_id: &TaskId) -> u64 {
        self.pending
            .iter()
            .find(|(id, _)| id == task_id)
            .map_or(0, |(_, at)| *at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TrendDirection;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn progress(task: &str, estimate: f64) -> ProgressAssessment {
        ProgressAssessment {
            task_id: TaskId::new(task),
            completion_estimate: estimate,
            confidence: 0.5,
            remaining_work: vec![],
            completed_work: vec![],
            blockers: vec![],
            risks: vec![],
            estimated_remaining_ms: 0,
            timestamp: t0(),
        }
    }

    fn blockers(task: &str) -> BlockerAssessment {
        BlockerAssessment {
            task_id: TaskId::new(task),
            blockers: vec![],
            severity: crate::domain::BlockerSeverity::None,
            can_proceed: true,
            suggested_actions: vec![],
            error_trend: TrendDirection::Stable,
            timestamp: t0(),
        }
    }

    #[test]
    fn slots_expire_independently() {
        let mut cache = AssessmentCache::new(CacheTtls::default(), 10);
        let task = TaskId::new("t1");
        cache.put(&task, progress("t1", 0.4), cache.token(), t0());
        cache.put(&task, blockers("t1"), cache.token(), t0());

        let later = t0() + Duration::minutes(3);
        assert!(cache.get::<ProgressAssessment>(&task, later).is_some());
        assert!(cache.get::<BlockerAssessment>(&task, later).is_none());
        assert!(cache.get::<ApproachAssessment>(&task, t0()).is_none());
    }

    #[test]
    fn write_computed_before_invalidation_is_refused() {
        let mut cache = AssessmentCache::new(CacheTtls::default(), 10);
        let task = TaskId::new("t1");
        let token = cache.token();
        cache.invalidate(&task);
        assert_eq!(cache.put(&task, progress("t1", 0.4), token, t0()), PutResult::Stale);
        assert!(cache.get::<ProgressAssessment>(&task, t0()).is_none());

        let fresh = cache.token();
        assert!(matches!(
            cache.put(&task, progress("t1", 0.5), fresh, t0()),
            PutResult::Stored { .. }
        ));
    }

    #[test]
    fn invalidation_of_other_task_does_not_block_writes() {
        let mut cache = AssessmentCache::new(CacheTtls::default(), 10);
        let token = cache.token();
        cache.invalidate(&TaskId::new("other"));
        let result = cache.put(&TaskId::new("t1"), progress("t1", 0.4), token, t0());
        assert!(matches!(result, PutResult::Stored { .. }));
    }

    #[test]
    fn oldest_task_is_evicted_when_full() {
        let mut cache = AssessmentCache::new(CacheTtls::default(), 2);
        for id in ["a", "b", "c"] {
            let token = cache.token();
            cache.put(&TaskId::new(id), progress(id, 0.1), token, t0());
        }
        assert!(cache.get::<ProgressAssessment>(&TaskId::new("a"), t0()).is_none());
        assert!(cache.get::<ProgressAssessment>(&TaskId::new("c"), t0()).is_some());
        assert_eq!(cache.task_count(), 2);
    }

    #[test]
    fn eviction_does_not_resurrect_invalidated_writes() {
        let mut cache = AssessmentCache::new(CacheTtls::default(), 1);
        let a = TaskId::new("a");
        cache.put(&a, progress("a", 0.1), cache.token(), t0());
        let token = cache.token();
        cache.invalidate(&a);
        // evicts "a" together with its invalidation marker
        let result = cache.put(&TaskId::new("b"), progress("b", 0.1), cache.token(), t0());
        assert_eq!(result, PutResult::Stored { evicted: Some(a.clone()) });
        assert_eq!(cache.put(&a, progress("a", 0.9), token, t0()), PutResult::Stale);
    }

    #[test]
    fn invalidating_uncached_task_evicts_nothing() {
        let mut cache = AssessmentCache::new(CacheTtls::default(), 2);
        for id in ["a", "b"] {
            let token = cache.token();
            cache.put(&TaskId::new(id), progress(id, 0.1), token, t0());
        }
        cache.invalidate(&TaskId::new("never-assessed"));

        assert!(cache.get::<ProgressAssessment>(&TaskId::new("a"), t0()).is_some());
        assert!(cache.get::<ProgressAssessment>(&TaskId::new("b"), t0()).is_some());
        assert_eq!(cache.task_count(), 2);
    }

    #[test]
    fn uncached_invalidation_still_refuses_its_own_stale_write() {
        let mut cache = AssessmentCache::new(CacheTtls::default(), 2);
        let task = TaskId::new("never-assessed");
        let token = cache.token();
        cache.invalidate(&task);
        assert_eq!(cache.put(&task, progress("never-assessed", 0.3), token, t0()), PutResult::Stale);

        let fresh = cache.token();
        assert!(matches!(
            cache.put(&task, progress("never-assessed", 0.4), fresh, t0()),
            PutResult::Stored { evicted: None }
        ));
        // the stored entry keeps the watermark
        assert_eq!(cache.put(&task, progress("never-assessed", 0.9), token, t0()), PutResult::Stale);
    }

    #[test]
    fn overflowing_uncached_invalidations_fall_back_to_refusing_old_writes() {
        let mut cache = AssessmentCache::new(CacheTtls::default(), 1);
        let token = cache.token();
        cache.invalidate(&TaskId::new("x"));
        cache.invalidate(&TaskId::new("y"));
        assert_eq!(
            cache.put(&TaskId::new("x"), progress("x", 0.2), token, t0()),
            PutResult::Stale
        );
    }

    #[test]
    fn clear_refuses_in_flight_writes() {
        let mut cache = AssessmentCache::new(CacheTtls::default(), 10);
        let token = cache.token();
        cache.clear();
        assert_eq!(
            cache.put(&TaskId::new("t1"), progress("t1", 0.4), token, t0()),
            PutResult::Stale
        );
        assert_eq!(cache.count(AssessmentKind::Progress), 0);
    }
}

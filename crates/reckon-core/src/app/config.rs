//! EngineConfig - エンジン設定
//!
//! Every field has a default, so `{}` is a valid configuration. Durations
//! are milliseconds.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::analysis::BlockerPatternSpec;
use crate::analysis::approach::DEFAULT_MIN_ITERATIONS;
use crate::analysis::progress::{DEFAULT_CONFIDENCE_FLOOR, DEFAULT_MAX_ITERATIONS};
use crate::cache::CacheTtls;
use crate::learning::DEFAULT_MIN_SAMPLE_SIZE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub learner: LearnerConfig,

    /// Lowest confidence a progress assessment reports.
    pub confidence_floor: f64,

    /// Iteration budget assumed when a context does not carry one.
    pub default_max_iterations: u32,

    /// Below this many iterations the approach is not judged.
    pub min_approach_iterations: usize,

    /// Replaces the built-in blocker table when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocker_patterns: Option<Vec<BlockerPatternSpec>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            learner: LearnerConfig::default(),
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            default_max_iterations: DEFAULT_MAX_ITERATIONS,
            min_approach_iterations: DEFAULT_MIN_ITERATIONS,
            blocker_patterns: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub progress_ttl_ms: u64,
    pub blockers_ttl_ms: u64,
    pub approach_ttl_ms: u64,
    /// Tasks kept before the oldest-inserted one is evicted.
    pub max_tasks: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            progress_ttl_ms: 5 * 60 * 1000,
            blockers_ttl_ms: 2 * 60 * 1000,
            approach_ttl_ms: 5 * 60 * 1000,
            max_tasks: 100,
        }
    }
}

impl CacheConfig {
    pub fn ttls(&self) -> CacheTtls {
        CacheTtls {
            progress: millis(self.progress_ttl_ms),
            blockers: millis(self.blockers_ttl_ms),
            approach: millis(self.approach_ttl_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    pub min_sample_size: usize,
    /// Capacity of the default in-memory outcome store.
    pub max_outcomes: usize,
    pub insight_ttl_ms: u64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
            max_outcomes: 1000,
            insight_ttl_ms: 5 * 60 * 1000,
        }
    }
}

impl LearnerConfig {
    pub fn insight_ttl(&self) -> Duration {
        millis(self.insight_ttl_ms)
    }
}

fn millis(ms: u64) -> Duration {
    Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

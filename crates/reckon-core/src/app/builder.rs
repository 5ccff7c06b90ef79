//! EngineBuilder - エンジンの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - `build()` は設定値とブロッカーパターン表を検証する
//! - 不正な設定は最初の評価ではなく構築時に `BuildError` で返す
//!
//! Every collaborator has a default, so `EngineBuilder::new().build()` gives
//! a working in-memory engine on the system clock.

use std::sync::Arc;

use crate::analysis::blockers::default_patterns;
use crate::analysis::{ApproachEvaluator, BlockerDetector, BlockerPattern, BlockerPatternSpec, ProgressAssessor};
use crate::impls::InMemoryOutcomeStore;
use crate::learning::HistoricalLearner;
use crate::ports::{
    AssessmentObserver, Clock, IdGenerator, KeywordExtractor, OutcomeStore, SystemClock,
    UlidGenerator,
};

use super::config::EngineConfig;
use super::engine::SelfAssessmentEngine;

/// EngineBuilder は SelfAssessmentEngine を構築
///
/// # 使用例
/// ```ignore
/// let engine = EngineBuilder::new()
///     .config(config)
///     .observer(Arc::new(BroadcastObserver::new(64)))
///     .build()?;
/// ```
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    store: Option<Arc<dyn OutcomeStore>>,
    extractors: Vec<Arc<dyn KeywordExtractor>>,
    observer: Option<Arc<dyn AssessmentObserver>>,
    patterns: Option<Vec<BlockerPatternSpec>>,
}

/// BuildError はエンジン構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid configuration: `{field}` {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("blocker pattern `{name}` does not compile: {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("custom blocker pattern table is empty")]
    EmptyPatternTable,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Without one, outcomes live in an [`InMemoryOutcomeStore`] bounded by
    /// `learner.max_outcomes`.
    pub fn outcome_store(mut self, store: Arc<dyn OutcomeStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Adds a keyword extractor. Any extractor given here replaces the
    /// learner's default stop-word extractor.
    pub fn keyword_extractor(mut self, extractor: Arc<dyn KeywordExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn AssessmentObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Replace the default nine-row blocker table. Takes precedence over
    /// `EngineConfig::blocker_patterns`.
    pub fn blocker_patterns(mut self, specs: Vec<BlockerPatternSpec>) -> Self {
        self.patterns = Some(specs);
        self
    }

    /// 設定を検証して SelfAssessmentEngine を生成
    ///
    /// # 検証
    /// - キャッシュ・学習器のサイズと TTL は 0 不可
    /// - confidence_floor は `[0, 0.95]`
    /// - カスタムパターン表は空不可、全ての正規表現がコンパイル可能
    pub fn build(self) -> Result<SelfAssessmentEngine, BuildError> {
        let config = self.config;
        validate(&config)?;

        let patterns = match self.patterns.or_else(|| config.blocker_patterns.clone()) {
            Some(specs) => compile_patterns(specs)?,
            None => default_patterns(),
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryOutcomeStore::new(config.learner.max_outcomes)));

        let learner = HistoricalLearner::new(store, Arc::clone(&clock))
            .with_extractors(self.extractors)
            .with_min_sample_size(config.learner.min_sample_size)
            .with_insight_ttl(config.learner.insight_ttl());

        Ok(SelfAssessmentEngine::from_parts(
            ProgressAssessor::new(config.confidence_floor, config.default_max_iterations),
            BlockerDetector::new(patterns),
            ApproachEvaluator::new(config.min_approach_iterations),
            learner,
            &config.cache,
            clock,
            ids,
            self.observer,
        ))
    }
}

fn validate(config: &EngineConfig) -> Result<(), BuildError> {
    let nonzero: [(&'static str, u64); 8] = [
        ("cache.max_tasks", config.cache.max_tasks as u64),
        ("cache.progress_ttl_ms", config.cache.progress_ttl_ms),
        ("cache.blockers_ttl_ms", config.cache.blockers_ttl_ms),
        ("cache.approach_ttl_ms", config.cache.approach_ttl_ms),
        ("learner.min_sample_size", config.learner.min_sample_size as u64),
        ("learner.max_outcomes", config.learner.max_outcomes as u64),
        ("learner.insight_ttl_ms", config.learner.insight_ttl_ms),
        ("default_max_iterations", u64::from(config.default_max_iterations)),
    ];
    if let Some(&(field, _)) = nonzero.iter().find(|(_, value)| *value == 0) {
        return Err(BuildError::InvalidConfig {
            field,
            reason: "must be greater than zero".to_string(),
        });
    }

    if !(0.0..=0.95).contains(&config.confidence_floor) {
        return Err(BuildError::InvalidConfig {
            field: "confidence_floor",
            reason: format!("must be within [0, 0.95], got {}", config.confidence_floor),
        });
    }
    Ok(())
}

fn compile_patterns(specs: Vec<BlockerPatternSpec>) -> Result<Vec<BlockerPattern>, BuildError> {
    if specs.is_empty() {
        return Err(BuildError::EmptyPatternTable);
    }
    specs
        .into_iter()
        .map(|spec| {
            let name = spec.name.clone();
            BlockerPattern::compile(spec).map_err(|source| BuildError::InvalidPattern { name, source })
        })
        .collect()
}

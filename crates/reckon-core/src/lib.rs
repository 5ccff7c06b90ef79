//! reckon-core
//!
//! Self-assessment for an autonomous coding agent: given the iteration
//! history of a task, estimate progress, detect blockers, judge whether the
//! current approach works, and learn from finished tasks.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, context, progress, blocker, approach, outcome, recommendation, errors, events）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, OutcomeStore, KeywordExtractor, AssessmentObserver）
//! - **impls**: 実装（InMemoryOutcomeStore, StopWordExtractor, BroadcastObserver）
//! - **analysis**: 評価アルゴリズム（trend, ProgressAssessor, BlockerDetector, ApproachEvaluator）
//! - **learning**: HistoricalLearner と insight 生成
//! - **cache**: TTL キャッシュとタスク単位の評価キャッシュ
//! - **app**: 設定、builder、判定表、SelfAssessmentEngine

pub mod analysis;
pub mod app;
pub mod cache;
pub mod domain;
pub mod impls;
pub mod learning;
pub mod ports;

pub use app::{BuildError, CacheStats, EngineBuilder, EngineConfig, SelfAssessmentEngine};
pub use domain::{
    AssessmentContext, ErrorEntry, FullAssessment, IterationHistoryEntry, ReckonError,
    Recommendation, RecommendedAction, TaskId, TaskOutcome,
};

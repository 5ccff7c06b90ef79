//! App - アプリケーション層
//!
//! analysis・learning・cache を組み合わせて、ホストから呼ばれる
//! 評価エンジンを実装します。
//!
//! # 主要コンポーネント
//! - **EngineConfig**: シリアライズ可能な設定（全項目にデフォルトあり）
//! - **EngineBuilder**: エンジンの構築とワイヤリング（Fail-fast 検証）
//! - **combine**: 三つの評価から推奨アクションを決める判定表
//! - **SelfAssessmentEngine**: キャッシュ・通知付きのオーケストレーター
//! - **CacheStats**: キャッシュの観測用スナップショット

pub mod builder;
pub mod combine;
pub mod config;
pub mod engine;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, EngineBuilder};
pub use self::config::{CacheConfig, EngineConfig, LearnerConfig};
pub use self::engine::SelfAssessmentEngine;
pub use self::status::CacheStats;

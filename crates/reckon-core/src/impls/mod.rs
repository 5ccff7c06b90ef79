//! Impls - ports のデフォルト実装
//!
//! - **InMemoryOutcomeStore**: bounded in-memory outcome storage
//! - **StopWordExtractor**: default keyword extraction
//! - **BroadcastObserver**: forwards observer hooks onto a broadcast channel
//!
//! Durable backends belong in their own crates and only need to implement
//! [`OutcomeStore`](crate::ports::OutcomeStore).

pub mod broadcast;
pub mod inmem_outcomes;
pub mod stop_words;

pub use self::broadcast::BroadcastObserver;
pub use self::inmem_outcomes::InMemoryOutcomeStore;
pub use self::stop_words::StopWordExtractor;

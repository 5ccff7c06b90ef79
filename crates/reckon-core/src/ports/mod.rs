//! Ports - 抽象化レイヤー
//!
//! Seams between the assessment core and the outside world: time, id
//! generation, outcome storage, keyword extraction and notifications.
//! Default implementations live in [`crate::impls`].

pub mod clock;
pub mod event_sink;
pub mod id_generator;
pub mod keywords;
pub mod outcome_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::AssessmentObserver;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::keywords::KeywordExtractor;
pub use self::outcome_store::OutcomeStore;

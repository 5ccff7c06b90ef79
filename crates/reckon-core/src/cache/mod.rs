//! Cache - TTL 付きキャッシュ
//!
//! - [`TtlCache`]: keyed values with one TTL, used for historical insights
//! - [`AssessmentCache`]: per-task progress/blocker/approach slots

pub mod assessment;
pub mod ttl;

pub use assessment::{AssessmentCache, AssessmentKind, CacheTtls, CachedAssessment, PutResult};
pub use ttl::{Stamped, TtlCache};

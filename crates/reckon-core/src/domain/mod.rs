//! Domain model: assessment inputs, assessment outputs, outcomes, errors.
//!
//! Nothing in here knows about caches, storage or the engine.

pub mod approach;
pub mod blocker;
pub mod context;
pub mod errors;
pub mod events;
pub mod ids;
pub mod outcome;
pub mod progress;
pub mod recommendation;
pub mod task_type;
pub mod trend;

pub use approach::{AlternativeApproach, ApproachAssessment, Effectiveness};
pub use blocker::{Blocker, BlockerAssessment, BlockerSeverity, BlockerType};
pub use context::{
    AssessmentContext, ErrorEntry, ErrorSeverity, FileChange, FileChangeKind,
    IterationHistoryEntry,
};
pub use errors::{ReckonError, StoreError, ValidationError};
pub use events::AssessmentEvent;
pub use ids::{AlternativeId, BlockerId, TaskId};
pub use outcome::{HistoricalInsight, TaskOutcome};
pub use progress::{ProgressAssessment, Risk, RiskType};
pub use recommendation::{FullAssessment, Recommendation, RecommendedAction};
pub use task_type::TaskCategory;
pub use trend::TrendDirection;

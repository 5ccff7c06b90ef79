//! Analysis - 三つの評価器
//!
//! - **ProgressAssessor**: completion estimate and confidence
//! - **BlockerDetector**: typed blockers with overall severity
//! - **ApproachEvaluator**: effectiveness of the current strategy
//!
//! All three are synchronous and side-effect free. Time and id generation
//! are passed in so the engine controls both.

pub mod approach;
pub mod blockers;
pub mod progress;
pub mod text;
pub mod trend;

pub use approach::{ApproachEvaluator, Criteria};
pub use blockers::{BlockerDetector, BlockerPattern, BlockerPatternSpec};
pub use progress::ProgressAssessor;
pub use trend::{least_squares_slope, ratio_trend, slope_trend};

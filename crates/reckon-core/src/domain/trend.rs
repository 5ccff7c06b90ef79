use serde::{Deserialize, Serialize};

/// Direction of the error count over recent iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Decreasing,
    Stable,
    Increasing,
}

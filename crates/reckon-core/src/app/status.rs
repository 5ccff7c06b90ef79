//! CacheStats - キャッシュの観測用スナップショット

use serde::{Deserialize, Serialize};

/// Point-in-time counts of what the engine is holding per task.
///
/// Slot counts include entries whose TTL has lapsed but which have not been
/// overwritten yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub tasks: usize,
    pub progress_entries: usize,
    pub blocker_entries: usize,
    pub approach_entries: usize,
    pub last_contexts: usize,
}

//! IdGenerator port - ID 生成の抽象化
//!
//! Blockers and alternatives get ULID-based ids whose timestamp part comes
//! from the injected [`Clock`], so a `FixedClock` gives deterministic
//! ordering in tests.

use crate::domain::ids::{AlternativeId, BlockerId};
use crate::ports::Clock;
use ulid::Ulid;

pub trait IdGenerator: Send + Sync {
    fn generate_blocker_id(&self) -> BlockerId;

    fn generate_alternative_id(&self) -> AlternativeId;
}

/// UlidGenerator は ULID ベースの ID 生成器
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_blocker_id(&self) -> BlockerId {
        BlockerId::from(self.next_ulid())
    }

    fn generate_alternative_id(&self) -> AlternativeId {
        AlternativeId::from(self.next_ulid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.generate_blocker_id();
        let id2 = id_gen.generate_blocker_id();

        assert_ne!(id1, id2);
        assert!(id_gen.generate_alternative_id().to_string().starts_with("alt-"));
    }

    #[test]
    fn ulid_generator_with_fixed_clock_shares_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_blocker_id();
        let id2 = id_gen.generate_blocker_id();

        // ランダム部分があるので ID は異なるが、timestamp 部分は同じ
        assert_ne!(id1, id2);
        assert_eq!(id1.as_ulid().timestamp_ms(), id2.as_ulid().timestamp_ms());
        assert_eq!(
            id1.as_ulid().timestamp_ms(),
            fixed_time.timestamp_millis() as u64
        );
    }
}

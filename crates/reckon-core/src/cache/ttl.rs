//! TtlCache - 有効期限付きの小さなキャッシュ
//!
//! Not thread-safe on its own; owners wrap it in a tokio lock and never
//! hold the lock across the computation that fills it.
//!
//! Every removal bumps a version counter. A writer that read
//! [`TtlCache::version`] before computing passes it back to
//! [`TtlCache::insert_if_unchanged`], which refuses the write if anything
//! was invalidated in between.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use chrono::{DateTime, Duration, Utc};

/// A value with the time it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<V> {
    pub value: V,
    pub stored_at: DateTime<Utc>,
}

impl<V> Stamped<V> {
    pub fn new(value: V, stored_at: DateTime<Utc>) -> Self {
        Self { value, stored_at }
    }

    /// Younger than `ttl` at `now`.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.stored_at) < ttl
    }
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, Stamped<V>>,
    /// Keys in first-insertion order, for eviction.
    order: VecDeque<K>,
    ttl: Duration,
    max_entries: usize,
    version: u64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            ttl,
            max_entries: max_entries.max(1),
            version: 0,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The value for `key` if it is still fresh.
    pub fn get(&self, key: &K, now: DateTime<Utc>) -> Option<V> {
        self.entries
            .get(key)
            .filter(|e| e.is_fresh(self.ttl, now))
            .map(|e| e.value.clone())
    }

    /// Store unconditionally. Returns the evicted key, if any.
    pub fn insert(&mut self, key: K, value: V, now: DateTime<Utc>) -> Option<K> {
        let mut evicted = None;
        if !self.entries.contains_key(&key) {
            if self.entries.len() >= self.max_entries {
                evicted = self.evict_oldest();
            }
            self.order.push_back(key.clone());
        }
        self.entries.insert(key, Stamped::new(value, now));
        evicted
    }

    /// Store only if nothing was removed since `version` was read.
    pub fn insert_if_unchanged(&mut self, key: K, value: V, version: u64, now: DateTime<Utc>) -> bool {
        if self.version != version {
            return false;
        }
        self.insert(key, value, now);
        true
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.version += 1;
        self.order.retain(|k| k != key);
        self.entries.remove(key).map(|e| e.value)
    }

    /// Keep only the keys for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.version += 1;
        self.entries.retain(|k, _| keep(k));
        let entries = &self.entries;
        self.order.retain(|k| entries.contains_key(k));
    }

    pub fn clear(&mut self) {
        self.version += 1;
        self.entries.clear();
        self.order.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    fn evict_oldest(&mut self) -> Option<K> {
        let oldest = self.order.pop_front()?;
        self.entries.remove(&oldest);
        Some(oldest)
    }
}

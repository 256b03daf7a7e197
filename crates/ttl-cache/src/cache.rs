//! Bounded keyed cache and single-value cell, both with TTL expiration.

use crate::clock::Clock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Cached value with its insertion time.
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> Entry<V> {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) < ttl
    }
}

/// Keyed cache holding at most `capacity` entries, each valid for `ttl`.
///
/// When full, expired entries are purged first; if none expired, the oldest
/// insertion is evicted.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    capacity: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
            clock,
        }
    }

    /// Get a fresh value for `key`.
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .map(|entry| entry.value.clone())
    }

    /// Insert or replace the value for `key`.
    pub async fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.is_fresh(now, ttl));

            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.inserted_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                    debug!("Evicted oldest cache entry (capacity {})", self.capacity);
                }
            }
        }

        entries.insert(
            key,
            Entry {
                value,
                inserted_at: now,
            },
        );
    }

    /// Number of stored entries, fresh or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Single cached value valid for `ttl` after it was set.
pub struct TtlCell<V> {
    slot: RwLock<Option<Entry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCell<V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl,
            clock,
        }
    }

    /// The value, if one was set less than `ttl` ago.
    pub async fn get(&self) -> Option<V> {
        let now = self.clock.now();
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .map(|entry| entry.value.clone())
    }

    /// Replace the value and restart its TTL.
    pub async fn set(&self, value: V) {
        let inserted_at = self.clock.now();
        *self.slot.write().await = Some(Entry { value, inserted_at });
    }
}

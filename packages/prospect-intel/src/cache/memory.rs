//! In-memory cache tiers.
//!
//! [`VolatileTier`] is the fast tier used inside every [`TieredCache`];
//! [`MemoryDurable`] is a durable-tier stand-in for tests and development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use super::{CacheEntry, DurableCache};
use crate::error::CacheResult;

/// Fast in-process tier.
///
/// Entries keep insertion order; when the capacity ceiling is hit the
/// structurally-oldest *inserted* entry is evicted. This approximates LRU
/// without recency tracking; callers must not assume a recently-read entry
/// is safe from eviction.
pub struct VolatileTier {
    entries: RwLock<IndexMap<String, CacheEntry>>,
    capacity: Option<usize>,
}

impl VolatileTier {
    /// Create a tier with an optional capacity ceiling.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            capacity,
        }
    }

    /// Get a payload if present and not expired, bumping the hit count.
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<serde_json::Value> {
        let mut entries = self.entries.write().unwrap();
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                entry.hit_count += 1;
                Some(entry.payload.clone())
            }
            _ => None,
        }
    }

    /// Insert an entry, evicting the oldest-inserted one at capacity.
    pub fn insert(&self, entry: CacheEntry) {
        let mut entries = self.entries.write().unwrap();
        if let Some(capacity) = self.capacity {
            if !entries.contains_key(&entry.key) && entries.len() >= capacity {
                if let Some((evicted, _)) = entries.shift_remove_index(0) {
                    tracing::debug!(key = %evicted, "volatile tier evicted oldest entry");
                }
            }
        }
        entries.insert(entry.key.clone(), entry);
    }

    /// Remove expired entries. Returns how many went.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    /// Number of live entries (including any not yet swept).
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the tier is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit count of an entry, for tests and metrics.
    pub fn hit_count(&self, key: &str) -> Option<u64> {
        self.entries.read().unwrap().get(key).map(|e| e.hit_count)
    }
}

/// In-memory durable tier for testing and development. Data is lost on
/// restart; production uses the `sqlite` feature's store.
#[derive(Default)]
pub struct MemoryDurable {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryDurable {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DurableCache for MemoryDurable {
    async fn load(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let mut entries = self.entries.write().unwrap();
        Ok(entries.get_mut(key).map(|entry| {
            entry.hit_count += 1;
            entry.clone()
        }))
    }

    async fn store(&self, entry: &CacheEntry) -> CacheResult<()> {
        self.entries
            .write()
            .unwrap()
            .insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> CacheResult<usize> {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(key: &str, ttl_secs: u64) -> CacheEntry {
        CacheEntry::new(key, serde_json::json!({"k": key}), Duration::from_secs(ttl_secs))
    }

    #[test]
    fn insertion_order_eviction() {
        let tier = VolatileTier::new(Some(2));
        tier.insert(entry("first", 60));
        tier.insert(entry("second", 60));

        // Reading "first" does NOT protect it: eviction is insertion-order.
        assert!(tier.get("first", Utc::now()).is_some());

        tier.insert(entry("third", 60));
        assert_eq!(tier.len(), 2);
        assert!(tier.get("first", Utc::now()).is_none());
        assert!(tier.get("second", Utc::now()).is_some());
        assert!(tier.get("third", Utc::now()).is_some());
    }

    #[test]
    fn rewriting_existing_key_does_not_evict() {
        let tier = VolatileTier::new(Some(2));
        tier.insert(entry("a", 60));
        tier.insert(entry("b", 60));
        tier.insert(entry("a", 60));
        assert_eq!(tier.len(), 2);
        assert!(tier.get("b", Utc::now()).is_some());
    }

    #[test]
    fn expired_entries_are_misses_and_purgeable() {
        let tier = VolatileTier::new(None);
        let mut stale = entry("stale", 60);
        stale.expires_at = Utc::now() - chrono::Duration::seconds(1);
        tier.insert(stale);
        tier.insert(entry("fresh", 60));

        assert!(tier.get("stale", Utc::now()).is_none());
        assert_eq!(tier.purge_expired(Utc::now()), 1);
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn hit_count_increments_on_read() {
        let tier = VolatileTier::new(None);
        tier.insert(entry("k", 60));
        tier.get("k", Utc::now());
        tier.get("k", Utc::now());
        assert_eq!(tier.hit_count("k"), Some(2));
    }

    #[tokio::test]
    async fn memory_durable_roundtrip_and_purge() {
        let store = MemoryDurable::new();
        store.store(&entry("k", 60)).await.unwrap();

        let loaded = store.load("k").await.unwrap().unwrap();
        assert_eq!(loaded.hit_count, 1);

        let mut stale = entry("stale", 60);
        stale.expires_at = Utc::now() - chrono::Duration::seconds(1);
        store.store(&stale).await.unwrap();

        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }
}

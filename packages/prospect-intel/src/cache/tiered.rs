//! The two-tier cache facade.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::{CacheEntry, DurableCache, VolatileTier};

/// Two-tier cache: volatile (fast) in front of durable (slower).
///
/// Reads check the volatile tier first; a durable hit is promoted into the
/// volatile tier on the way out (read-through promotion). Writes land in the
/// volatile tier and are mirrored to the durable tier best-effort: a
/// failing durable tier costs durability, never the write.
///
/// A miss in both tiers is a miss, not an error. Safe under concurrent
/// access from parallel fetch tasks; concurrent sets on the same key are
/// last-write-wins.
pub struct TieredCache {
    volatile: VolatileTier,
    durable: Option<Arc<dyn DurableCache>>,
}

impl TieredCache {
    /// Volatile-only cache with an optional capacity ceiling.
    pub fn in_memory(capacity: Option<usize>) -> Self {
        Self {
            volatile: VolatileTier::new(capacity),
            durable: None,
        }
    }

    /// Attach a durable tier.
    pub fn with_durable(mut self, durable: Arc<dyn DurableCache>) -> Self {
        self.durable = Some(durable);
        self
    }

    /// Look up a payload by key.
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Utc::now();

        if let Some(payload) = self.volatile.get(key, now) {
            tracing::debug!(key = %key, tier = "volatile", "cache hit");
            return Some(payload);
        }

        let durable = self.durable.as_ref()?;
        match durable.load(key).await {
            Ok(Some(entry)) if !entry.is_expired_at(now) => {
                tracing::debug!(key = %key, tier = "durable", "cache hit, promoting");
                let payload = entry.payload.clone();
                self.volatile.insert(entry);
                Some(payload)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "durable tier read failed");
                None
            }
        }
    }

    /// Store a payload under `key` for `ttl`.
    pub async fn set(&self, key: &str, payload: serde_json::Value, ttl: Duration) {
        let entry = CacheEntry::new(key, payload, ttl);

        if let Some(durable) = &self.durable {
            if let Err(e) = durable.store(&entry).await {
                tracing::warn!(key = %key, error = %e, "durable tier write failed");
            }
        }

        self.volatile.insert(entry);
    }

    /// Purge expired entries from both tiers. Returns how many went.
    ///
    /// Safe to call concurrently with reads/writes; suitable for a periodic
    /// schedule.
    pub async fn invalidate_expired(&self) -> usize {
        let now = Utc::now();
        let mut purged = self.volatile.purge_expired(now);

        if let Some(durable) = &self.durable {
            match durable.purge_expired(now).await {
                Ok(count) => purged += count,
                Err(e) => tracing::warn!(error = %e, "durable tier purge failed"),
            }
        }

        purged
    }

    /// Entries currently in the volatile tier.
    pub fn volatile_len(&self) -> usize {
        self.volatile.len()
    }
}

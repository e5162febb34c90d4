//! Tiered caching: a fast volatile tier in front of a slower durable tier.
//!
//! - [`TieredCache`]: the two-tier facade with read-through promotion
//! - [`VolatileTier`]: in-process, insertion-ordered, capacity-bounded
//! - [`DurableCache`]: trait for the durable tier ([`MemoryDurable`] for
//!   tests, `SqliteCache` behind the `sqlite` feature for production)
//!
//! Cache keys are deterministic digests of call-site parameters so identical
//! logical requests collapse to the same entry regardless of who issues them.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod tiered;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CacheResult;

pub use memory::{MemoryDurable, VolatileTier};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCache;
pub use tiered::TieredCache;

/// One cached value. Owned exclusively by the cache; mutated only through
/// cache set/get; destroyed on expiry sweep or capacity eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Deterministic key (see [`cache_key`])
    pub key: String,

    /// Opaque payload
    pub payload: serde_json::Value,

    /// When the entry was written
    pub created_at: DateTime<Utc>,

    /// `created_at + ttl`, computed at write time and checked (never
    /// recomputed) at read time
    pub expires_at: DateTime<Utc>,

    /// Reads served from this entry
    pub hit_count: u64,
}

impl CacheEntry {
    /// Create an entry expiring `ttl` from now.
    pub fn new(key: impl Into<String>, payload: serde_json::Value, ttl: Duration) -> Self {
        let created_at = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            key: key.into(),
            payload,
            created_at,
            expires_at: created_at + ttl,
            hit_count: 0,
        }
    }

    /// Expired strictly after `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Durable (slower) cache tier.
///
/// Writes from [`TieredCache`] are best-effort: a failing durable tier
/// degrades durability, never correctness.
#[async_trait]
pub trait DurableCache: Send + Sync {
    /// Load an entry by key, bumping its hit count when found.
    ///
    /// Expiry is the caller's concern; implementations return whatever is
    /// stored.
    async fn load(&self, key: &str) -> CacheResult<Option<CacheEntry>>;

    /// Upsert an entry keyed on `entry.key`.
    async fn store(&self, entry: &CacheEntry) -> CacheResult<()>;

    /// Delete entries with `expires_at < now`. Returns how many went.
    async fn purge_expired(&self, now: DateTime<Utc>) -> CacheResult<usize>;
}

/// Build a deterministic cache key from call-site parameters.
///
/// Parts are trimmed and lowercased before digesting so that casing or
/// stray whitespace in a query doesn't split the cache.
pub fn cache_key(provider: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.trim().to_lowercase().as_bytes());
        hasher.update([0x1f]);
    }
    let digest = hasher.finalize();
    format!("{}:{}", provider, &hex::encode(digest)[..16])
}

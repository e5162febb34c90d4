//! SQLite-backed durable cache tier.
//!
//! A file-based durable tier suitable for local development and
//! single-server deployments. Requires the `sqlite` feature.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use super::{CacheEntry, DurableCache};
use crate::error::{CacheError, CacheResult};

/// SQLite durable tier with upsert semantics keyed on `cache_key`.
pub struct SqliteCache {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct EntryRow {
    cache_key: String,
    payload: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    hit_count: i64,
}

impl EntryRow {
    fn into_entry(self) -> CacheResult<CacheEntry> {
        Ok(CacheEntry {
            key: self.cache_key,
            payload: serde_json::from_str(&self.payload)?,
            created_at: self.created_at,
            expires_at: self.expires_at,
            hit_count: self.hit_count.max(0) as u64,
        })
    }
}

impl SqliteCache {
    /// Create a store with the given connection URL.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite:./cache.db?mode=rwc` - File-based, create if missing
    pub async fn new(database_url: &str) -> CacheResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| CacheError::Storage(Box::new(e)))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> CacheResult<Self> {
        Self::new("sqlite::memory:").await
    }

    async fn run_migrations(&self) -> CacheResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                cache_key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                hit_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at
                ON cache_entries(expires_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Storage(Box::new(e)))?;

        Ok(())
    }
}

#[async_trait]
impl DurableCache for SqliteCache {
    async fn load(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        sqlx::query("UPDATE cache_entries SET hit_count = hit_count + 1 WHERE cache_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::Storage(Box::new(e)))?;

        let row = sqlx::query_as::<_, EntryRow>(
            "SELECT cache_key, payload, created_at, expires_at, hit_count
             FROM cache_entries WHERE cache_key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CacheError::Storage(Box::new(e)))?;

        row.map(EntryRow::into_entry).transpose()
    }

    async fn store(&self, entry: &CacheEntry) -> CacheResult<()> {
        let payload = serde_json::to_string(&entry.payload)?;

        sqlx::query(
            r#"
            INSERT INTO cache_entries (cache_key, payload, created_at, expires_at, hit_count)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET
                payload = excluded.payload,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at,
                hit_count = excluded.hit_count
            "#,
        )
        .bind(&entry.key)
        .bind(payload)
        .bind(entry.created_at)
        .bind(entry.expires_at)
        .bind(entry.hit_count as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Storage(Box::new(e)))?;

        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> CacheResult<usize> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at < ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::Storage(Box::new(e)))?;

        Ok(result.rows_affected() as usize)
    }
}

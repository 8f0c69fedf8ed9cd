//! SQLite-backed cache store (`cache_entries` table)

use super::{Bucket, BucketPredicate, CacheError, CacheStore};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tdk_common::time::{now, to_unix_millis};

/// Cache entries persisted in SQLite, expiry stored as epoch milliseconds
#[derive(Clone)]
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete every expired row; returns rows removed
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(to_unix_millis(now()))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, bucket: &Bucket, entry_key: &str) -> Result<Option<Value>, CacheError> {
        let row: Option<(String, i64)> = sqlx::query_as(
            "SELECT payload, expires_at FROM cache_entries WHERE bucket = ? AND entry_key = ?",
        )
        .bind(bucket.name())
        .bind(entry_key)
        .fetch_optional(&self.pool)
        .await?;

        let Some((payload, expires_at)) = row else {
            return Ok(None);
        };

        let current = to_unix_millis(now());
        if expires_at <= current {
            sqlx::query(
                "DELETE FROM cache_entries WHERE bucket = ? AND entry_key = ? AND expires_at <= ?",
            )
            .bind(bucket.name())
            .bind(entry_key)
            .bind(current)
            .execute(&self.pool)
            .await?;
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&payload)?))
    }

    async fn set(&self, bucket: &Bucket, entry_key: &str, value: Value) -> Result<(), CacheError> {
        let payload = serde_json::to_string(&value)?;
        let expires_at = to_unix_millis(now() + bucket.ttl());

        sqlx::query(
            r#"
            INSERT INTO cache_entries (bucket, entry_key, payload, expires_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(bucket, entry_key) DO UPDATE SET
                payload = excluded.payload,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(bucket.name())
        .bind(entry_key)
        .bind(payload)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn invalidate_by(&self, predicate: BucketPredicate<'_>) -> Result<usize, CacheError> {
        let names: Vec<String> = sqlx::query_scalar("SELECT DISTINCT bucket FROM cache_entries")
            .fetch_all(&self.pool)
            .await?;

        let matching: Vec<String> = names.into_iter().filter(|n| predicate(n)).collect();
        if matching.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for name in &matching {
            sqlx::query("DELETE FROM cache_entries WHERE bucket = ?")
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(matching.len())
    }

    async fn bucket_names(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        // LIKE treats '_' as a wildcard, so the prefix is compared with substr
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT bucket FROM cache_entries
            WHERE expires_at > ? AND substr(bucket, 1, length(?)) = ?
            ORDER BY bucket
            "#,
        )
        .bind(to_unix_millis(now()))
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }
}

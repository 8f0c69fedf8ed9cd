//! Manual mapping store
//!
//! An operator can bind a library media ID straight to a provider's
//! external ID. The resolver only reads these; a mapping always wins over
//! title search. Nothing is cached here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::RwLock;
use tdk_common::Result;

/// `(provider, media_id) → external_id` override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualMapping {
    pub provider: String,
    pub media_id: i64,
    pub external_id: String,
}

/// Storage for manual mappings
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// `Ok(None)` when no mapping exists
    async fn lookup(&self, provider: &str, media_id: i64) -> Result<Option<String>>;

    async fn upsert(&self, mapping: &ManualMapping) -> Result<()>;

    /// Returns whether a mapping was removed
    async fn remove(&self, provider: &str, media_id: i64) -> Result<bool>;
}

/// Mappings in the `manual_mappings` table
#[derive(Clone)]
pub struct SqliteMappingStore {
    pool: SqlitePool,
}

impl SqliteMappingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MappingStore for SqliteMappingStore {
    async fn lookup(&self, provider: &str, media_id: i64) -> Result<Option<String>> {
        let external_id: Option<String> = sqlx::query_scalar(
            "SELECT external_id FROM manual_mappings WHERE provider = ? AND media_id = ?",
        )
        .bind(provider)
        .bind(media_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(external_id)
    }

    async fn upsert(&self, mapping: &ManualMapping) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO manual_mappings (provider, media_id, external_id)
            VALUES (?, ?, ?)
            ON CONFLICT(provider, media_id) DO UPDATE SET external_id = excluded.external_id
            "#,
        )
        .bind(&mapping.provider)
        .bind(mapping.media_id)
        .bind(&mapping.external_id)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            provider = %mapping.provider,
            media_id = mapping.media_id,
            external_id = %mapping.external_id,
            "Saved manual mapping"
        );
        Ok(())
    }

    async fn remove(&self, provider: &str, media_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM manual_mappings WHERE provider = ? AND media_id = ?")
            .bind(provider)
            .bind(media_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-process mapping store
#[derive(Default)]
pub struct MemoryMappingStore {
    mappings: RwLock<HashMap<(String, i64), String>>,
}

impl MemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MappingStore for MemoryMappingStore {
    async fn lookup(&self, provider: &str, media_id: i64) -> Result<Option<String>> {
        let mappings = self.mappings.read().unwrap_or_else(|e| e.into_inner());
        Ok(mappings.get(&(provider.to_string(), media_id)).cloned())
    }

    async fn upsert(&self, mapping: &ManualMapping) -> Result<()> {
        let mut mappings = self.mappings.write().unwrap_or_else(|e| e.into_inner());
        mappings.insert(
            (mapping.provider.clone(), mapping.media_id),
            mapping.external_id.clone(),
        );
        Ok(())
    }

    async fn remove(&self, provider: &str, media_id: i64) -> Result<bool> {
        let mut mappings = self.mappings.write().unwrap_or_else(|e| e.into_inner());
        Ok(mappings.remove(&(provider.to_string(), media_id)).is_some())
    }
}

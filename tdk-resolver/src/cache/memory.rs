//! In-process cache store

use super::{Bucket, BucketPredicate, CacheError, CacheStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredEntry {
    payload: Value,
    expires_at: DateTime<Utc>,
}

impl StoredEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Buckets held in a `HashMap` behind a lock
#[derive(Default)]
pub struct MemoryCacheStore {
    buckets: RwLock<HashMap<String, HashMap<String, StoredEntry>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn evict(&self, bucket: &str, entry_key: &str) {
        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entries) = buckets.get_mut(bucket) {
            // Re-check: a writer may have refreshed the entry since the read
            if entries.get(entry_key).is_some_and(|e| !e.is_live(Utc::now())) {
                entries.remove(entry_key);
            }
            if entries.is_empty() {
                buckets.remove(bucket);
            }
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, bucket: &Bucket, entry_key: &str) -> Result<Option<Value>, CacheError> {
        let found = {
            let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
            buckets
                .get(bucket.name())
                .and_then(|entries| entries.get(entry_key))
                .cloned()
        };

        match found {
            Some(entry) if entry.is_live(Utc::now()) => Ok(Some(entry.payload)),
            Some(_) => {
                self.evict(bucket.name(), entry_key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, bucket: &Bucket, entry_key: &str, value: Value) -> Result<(), CacheError> {
        let entry = StoredEntry {
            payload: value,
            expires_at: Utc::now() + bucket.ttl(),
        };

        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        buckets
            .entry(bucket.name().to_string())
            .or_default()
            .insert(entry_key.to_string(), entry);
        Ok(())
    }

    async fn invalidate_by(&self, predicate: BucketPredicate<'_>) -> Result<usize, CacheError> {
        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        let before = buckets.len();
        buckets.retain(|name, _| !predicate(name));
        Ok(before - buckets.len())
    }

    async fn bucket_names(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let now = Utc::now();
        let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());

        let mut names: Vec<String> = buckets
            .iter()
            .filter(|(name, entries)| {
                name.starts_with(prefix) && entries.values().any(|e| e.is_live(now))
            })
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

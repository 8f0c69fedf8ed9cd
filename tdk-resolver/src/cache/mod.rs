//! TTL-bucketed cache store
//!
//! Values are stored as JSON. Expiry is checked lazily on read: an expired
//! entry is reported as a miss, exactly like an absent one.

pub mod key;
mod memory;
mod sqlite;

pub use key::{
    is_media_bucket, Bucket, BucketKey, ContentKind, AGGREGATE_NAMESPACE, MANGA_NAMESPACE,
    ONLINESTREAM_NAMESPACE,
};
pub use memory::MemoryCacheStore;
pub use sqlite::SqliteCacheStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Cache store failure
///
/// The resolver downgrades these: a failed read is a miss and a failed write
/// is logged.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache storage error: {0}")]
    Storage(#[from] tdk_common::Error),

    #[error("Cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::Storage(tdk_common::Error::Database(e))
    }
}

/// Predicate over bucket names used for bulk invalidation
pub type BucketPredicate<'a> = &'a (dyn Fn(&str) -> bool + Send + Sync);

/// Storage backend for cache buckets
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Live value for `entry_key`, `None` when absent or expired
    async fn get(&self, bucket: &Bucket, entry_key: &str) -> Result<Option<Value>, CacheError>;

    /// Store `value`, expiring after the bucket's TTL
    async fn set(&self, bucket: &Bucket, entry_key: &str, value: Value) -> Result<(), CacheError>;

    /// Drop every bucket whose name matches; returns the number of buckets removed
    async fn invalidate_by(&self, predicate: BucketPredicate<'_>) -> Result<usize, CacheError>;

    /// Names of buckets holding at least one live entry, filtered by name prefix
    async fn bucket_names(&self, prefix: &str) -> Result<Vec<String>, CacheError>;
}

/// Read and deserialize a cached value
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn CacheStore,
    bucket: &Bucket,
    entry_key: &str,
) -> Result<Option<T>, CacheError> {
    match store.get(bucket, entry_key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize and store a value
pub async fn set_typed<T: Serialize + Sync>(
    store: &dyn CacheStore,
    bucket: &Bucket,
    entry_key: &str,
    value: &T,
) -> Result<(), CacheError> {
    let value = serde_json::to_value(value)?;
    store.set(bucket, entry_key, value).await
}

//! Cache store whose reads and writes always fail

use async_trait::async_trait;
use serde_json::{json, Value};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use tdk_resolver::cache::{Bucket, BucketPredicate, CacheError, CacheStore};

pub struct FailingCacheStore {
    corrupt_reads: bool,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl FailingCacheStore {
    /// Storage errors on every read and write
    pub fn new() -> Self {
        Self {
            corrupt_reads: false,
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
        }
    }

    /// Reads return a payload that is not a container; writes still fail
    pub fn corrupt() -> Self {
        Self {
            corrupt_reads: true,
            ..Self::new()
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

fn unavailable() -> CacheError {
    CacheError::Storage(tdk_common::Error::Io(io::Error::other("cache unavailable")))
}

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn get(&self, _bucket: &Bucket, _entry_key: &str) -> Result<Option<Value>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.corrupt_reads {
            Ok(Some(json!({"garbage": true})))
        } else {
            Err(unavailable())
        }
    }

    async fn set(&self, _bucket: &Bucket, _entry_key: &str, _value: Value) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        Err(unavailable())
    }

    async fn invalidate_by(&self, _predicate: BucketPredicate<'_>) -> Result<usize, CacheError> {
        Ok(0)
    }

    async fn bucket_names(&self, _prefix: &str) -> Result<Vec<String>, CacheError> {
        Ok(Vec::new())
    }
}

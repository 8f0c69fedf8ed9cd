//! Test Helper Utilities
//!
//! Shared fixtures for tdk-resolver integration tests

#![allow(dead_code)]

pub mod failing_cache;
pub mod mock_providers;

pub use failing_cache::FailingCacheStore;
pub use mock_providers::{chapter, episode, MockManga, MockStream};

use std::sync::Arc;
use tdk_resolver::cache::{CacheStore, MemoryCacheStore, SqliteCacheStore};
use tdk_resolver::mapping::{MappingStore, MemoryMappingStore, SqliteMappingStore};
use tdk_resolver::{Hooks, ProviderRegistry, Resolver};

pub const MANGA: &str = "provA";
pub const STREAM: &str = "streamA";

/// Resolver wired to mock providers and in-memory stores
pub struct Harness {
    pub resolver: Arc<Resolver>,
    pub manga: Arc<MockManga>,
    pub stream: Arc<MockStream>,
    pub mappings: Arc<dyn MappingStore>,
    pub cache: Arc<dyn CacheStore>,
}

impl Harness {
    pub fn new(manga: MockManga) -> Self {
        Self::build(
            manga,
            MockStream::new(),
            Arc::new(MemoryMappingStore::new()),
            Arc::new(MemoryCacheStore::new()),
        )
    }

    pub fn with_stream(stream: MockStream) -> Self {
        Self::build(
            MockManga::new(),
            stream,
            Arc::new(MemoryMappingStore::new()),
            Arc::new(MemoryCacheStore::new()),
        )
    }

    /// Same wiring over a caller-supplied cache store
    pub fn with_cache(manga: MockManga, cache: Arc<dyn CacheStore>) -> Self {
        Self::build(
            manga,
            MockStream::new(),
            Arc::new(MemoryMappingStore::new()),
            cache,
        )
    }

    /// Same wiring over a fresh in-memory SQLite database
    pub async fn sqlite(manga: MockManga) -> Self {
        let pool = tdk_common::db::init_in_memory().await.unwrap();
        Self::build(
            manga,
            MockStream::new(),
            Arc::new(SqliteMappingStore::new(pool.clone())),
            Arc::new(SqliteCacheStore::new(pool)),
        )
    }

    fn build(
        manga: MockManga,
        stream: MockStream,
        mappings: Arc<dyn MappingStore>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        let manga = Arc::new(manga);
        let stream = Arc::new(stream);

        let registry = Arc::new(ProviderRegistry::new());
        registry.register_manga(MANGA, manga.clone()).unwrap();
        registry.register_onlinestream(STREAM, stream.clone()).unwrap();

        let resolver = Resolver::new(
            registry,
            Arc::clone(&mappings),
            Arc::clone(&cache),
            Arc::new(Hooks::new()),
        );

        Self {
            resolver: Arc::new(resolver),
            manga,
            stream,
            mappings,
            cache,
        }
    }
}

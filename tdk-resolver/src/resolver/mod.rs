//! Content resolution pipeline
//!
//! Resolves `(provider, media_id, titles)` to a content container:
//!
//! 1. Requested interception (a handler may supply the container outright)
//! 2. Cache check
//! 3. Manual mapping, otherwise concurrent per-title search and ranking
//! 4. Fetch from the provider, relabel items with the requesting provider
//! 5. Produced interception
//! 6. Cache write (non-empty, not hook-supplied)
//!
//! Fetch and cache write run at most once at a time per bucket; concurrent
//! callers for the same bucket wait and then read the freshly cached value.

mod aggregate;
mod refresh;
mod source;

pub use aggregate::{latest_numbers_for, LatestNumber, LATEST_NUMBERS_BUCKET, LATEST_NUMBERS_KEY};
pub use refresh::{LibraryEntry, ReadingStatus, RefreshReport};

use crate::cache::{
    get_typed, is_media_bucket, set_typed, Bucket, BucketKey, CacheError, CacheStore, ContentKind,
};
use crate::error::{InterceptionStage, ProviderError, ResolveError, ResolveResult};
use crate::hooks::{ContainerHooks, Hooks, ProducedEvent, RequestedEvent};
use crate::mapping::MappingStore;
use crate::matcher::{hydrate_ratings, is_mostly_latin, normalize, select_best};
use crate::providers::{
    ChapterDetails, EpisodeDetails, ProviderItem, SearchOptions, SearchResult, VolumeDetails,
};
use crate::registry::ProviderRegistry;
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use source::{ChapterSource, ContentSource, EpisodeSource, VolumeSource};
use std::future::Future;
use std::sync::Arc;
use tdk_common::config::DEFAULT_CACHE_TTL_DAYS;
use tdk_common::events::{EventBus, ResolutionSource, TsundokuEvent};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Ordered provider items for one (provider, media) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container<T> {
    pub media_id: i64,
    pub provider: String,
    pub items: Vec<T>,
}

impl<T> Container<T> {
    pub fn empty(provider: impl Into<String>, media_id: i64) -> Self {
        Self {
            media_id,
            provider: provider.into(),
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// What to resolve
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerRequest {
    pub provider: String,
    pub media_id: i64,
    /// Library titles in preference order
    pub titles: Vec<String>,
    pub year: Option<i32>,
    /// Episode lookups only
    pub dubbed: bool,
}

impl ContainerRequest {
    pub fn new(provider: impl Into<String>, media_id: i64) -> Self {
        Self {
            provider: provider.into(),
            media_id,
            ..Self::default()
        }
    }

    pub fn with_titles<I, S>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.titles = titles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn dubbed(mut self, dubbed: bool) -> Self {
        self.dubbed = dubbed;
        self
    }
}

/// Resolution pipeline over a provider registry, mapping store and cache
pub struct Resolver {
    registry: Arc<ProviderRegistry>,
    mappings: Arc<dyn MappingStore>,
    cache: Arc<dyn CacheStore>,
    hooks: Arc<Hooks>,
    events: EventBus,
    ttl: chrono::Duration,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
    /// Bumped on every aggregate invalidation; memo writes and
    /// invalidations are serialized through this lock
    memo_generation: Mutex<u64>,
}

impl Resolver {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        mappings: Arc<dyn MappingStore>,
        cache: Arc<dyn CacheStore>,
        hooks: Arc<Hooks>,
    ) -> Self {
        Self {
            registry,
            mappings,
            cache,
            hooks,
            events: EventBus::default(),
            ttl: chrono::Duration::days(i64::from(DEFAULT_CACHE_TTL_DAYS)),
            in_flight: DashMap::new(),
            memo_generation: Mutex::new(0),
        }
    }

    /// TTL applied to content buckets and the aggregate memo
    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn get_chapter_container(
        &self,
        request: &ContainerRequest,
    ) -> ResolveResult<Container<ChapterDetails>> {
        self.resolve(request, ContentKind::Chapters, &self.hooks.chapters, || {
            self.registry.manga(&request.provider).map(ChapterSource)
        })
        .await
    }

    pub async fn get_volume_container(
        &self,
        request: &ContainerRequest,
    ) -> ResolveResult<Container<VolumeDetails>> {
        self.resolve(request, ContentKind::Volumes, &self.hooks.volumes, || {
            self.registry.manga(&request.provider).map(VolumeSource)
        })
        .await
    }

    /// Dubbed and subbed listings live in separate buckets; dubbed lookups
    /// need a provider that reports dub support
    pub async fn get_episode_container(
        &self,
        request: &ContainerRequest,
    ) -> ResolveResult<Container<EpisodeDetails>> {
        let kind = if request.dubbed {
            ContentKind::DubbedEpisodes
        } else {
            ContentKind::Episodes
        };

        self.resolve(request, kind, &self.hooks.episodes, || {
            let provider = self.registry.onlinestream(&request.provider)?;
            if request.dubbed && !provider.settings().supports_dub {
                debug!(provider = %request.provider, "Provider has no dubbed listings");
                return Err(ResolveError::NoAnimeFound {
                    last_error: Some(ProviderError::Unsupported("dubbed episodes")),
                });
            }
            Ok(EpisodeSource(provider))
        })
        .await
    }

    /// Remove every content bucket of `media_id` across providers and kinds
    pub async fn empty_cache(&self, media_id: i64) -> Result<usize, CacheError> {
        let removed = self
            .cache
            .invalidate_by(&|name: &str| is_media_bucket(name, media_id))
            .await?;
        self.invalidate_latest_numbers().await;

        info!(media_id, buckets = removed, "Emptied media cache");
        self.events.emit_lossy(TsundokuEvent::CacheInvalidated {
            media_id,
            buckets_removed: removed,
            timestamp: tdk_common::time::now(),
        });
        Ok(removed)
    }

    async fn resolve<T, S, F>(
        &self,
        request: &ContainerRequest,
        kind: ContentKind,
        hooks: &ContainerHooks<T>,
        lookup: F,
    ) -> ResolveResult<Container<T>>
    where
        T: ProviderItem,
        S: ContentSource<T>,
        F: FnOnce() -> ResolveResult<S> + Send,
    {
        let key = BucketKey::new(request.provider.as_str(), kind, request.media_id);

        let mut requested = RequestedEvent {
            provider: request.provider.clone(),
            media_id: request.media_id,
            titles: request.titles.clone(),
            year: request.year,
            container: Container::empty(request.provider.as_str(), request.media_id),
            default_prevented: false,
        };
        hooks
            .requested
            .trigger(&mut requested)
            .map_err(|source| ResolveError::Interception {
                stage: InterceptionStage::Requested,
                source,
            })?;

        if requested.default_prevented {
            let container = requested.container;
            debug!(bucket = %key, items = container.items.len(), "Requested handler supplied container");
            self.emit_resolved(&key, container.items.len(), ResolutionSource::Interception);
            return Ok(container);
        }

        if let Some(container) = self.read_cached::<T>(&key).await {
            return self
                .produce(request, &key, hooks, container, ResolutionSource::Cache)
                .await;
        }

        let source = lookup()?;

        self.single_flight(&key, async {
            // A concurrent caller may have filled the bucket while this one waited
            if let Some(container) = self.read_cached::<T>(&key).await {
                return self
                    .produce(request, &key, hooks, container, ResolutionSource::Cache)
                    .await;
            }

            let (external_id, origin) = self.resolve_external_id::<T, S>(request, kind, &source).await?;
            debug!(bucket = %key, external_id = %external_id, "Fetching content");

            let mut items = source
                .fetch(&external_id)
                .await
                .map_err(|e| fetch_error(kind, e))?;

            if is_episode_kind(kind) && items.is_empty() {
                return Err(ResolveError::NoEpisodes { source: None });
            }

            for item in &mut items {
                item.set_provider(&request.provider);
            }

            let container = Container {
                media_id: request.media_id,
                provider: request.provider.clone(),
                items,
            };
            self.produce(request, &key, hooks, container, origin).await
        })
        .await
    }

    /// Fire the Produced interception, then cache and return
    async fn produce<T: ProviderItem>(
        &self,
        request: &ContainerRequest,
        key: &BucketKey,
        hooks: &ContainerHooks<T>,
        container: Container<T>,
        origin: ResolutionSource,
    ) -> ResolveResult<Container<T>> {
        let from_cache = origin == ResolutionSource::Cache;
        let mut event = ProducedEvent {
            provider: request.provider.clone(),
            media_id: request.media_id,
            titles: request.titles.clone(),
            year: request.year,
            container,
            from_cache,
            default_prevented: false,
        };
        hooks
            .produced
            .trigger(&mut event)
            .map_err(|source| ResolveError::Interception {
                stage: InterceptionStage::Produced,
                source,
            })?;

        if event.default_prevented {
            debug!(bucket = %key, "Produced handler overrode container, not caching");
            self.emit_resolved(key, event.container.items.len(), ResolutionSource::Interception);
            return Ok(event.container);
        }

        if !from_cache {
            self.write_cache(key, &event.container).await;
        }

        self.emit_resolved(key, event.container.items.len(), origin);
        Ok(event.container)
    }

    async fn resolve_external_id<T, S>(
        &self,
        request: &ContainerRequest,
        kind: ContentKind,
        source: &S,
    ) -> ResolveResult<(String, ResolutionSource)>
    where
        T: Send,
        S: ContentSource<T>,
    {
        match self
            .mappings
            .lookup(&request.provider, request.media_id)
            .await
        {
            Ok(Some(external_id)) => {
                debug!(
                    provider = %request.provider,
                    media_id = request.media_id,
                    external_id = %external_id,
                    "Using manual mapping"
                );
                return Ok((external_id, ResolutionSource::Mapping));
            }
            Ok(None) => {}
            Err(e) => warn!(
                provider = %request.provider,
                media_id = request.media_id,
                error = %e,
                "Mapping lookup failed, falling back to search"
            ),
        }

        let best = self.search_best::<T, S>(request, kind, source).await?;
        Ok((best.external_id, ResolutionSource::Search))
    }

    /// One concurrent search per usable title, merged in title order, best result wins
    async fn search_best<T, S>(
        &self,
        request: &ContainerRequest,
        kind: ContentKind,
        source: &S,
    ) -> ResolveResult<SearchResult>
    where
        T: Send,
        S: ContentSource<T>,
    {
        if request.titles.iter().all(|t| t.trim().is_empty()) {
            return Err(ResolveError::NoTitlesProvided);
        }

        let titles = searchable_titles(&request.titles);
        if titles.is_empty() {
            debug!(provider = %request.provider, media_id = request.media_id, "No searchable titles");
            return Err(empty_search_error(kind, None));
        }

        let searches = titles.iter().map(|title| {
            let options = SearchOptions {
                query: title.clone(),
                year: request.year,
                dubbed: request.dubbed,
            };
            async move { source.search(&options).await }
        });
        let outcomes = join_all(searches).await;

        let mut merged: Vec<SearchResult> = Vec::new();
        let mut last_error: Option<ProviderError> = None;
        let mut failures = 0usize;
        let mut timeouts = 0usize;

        for (title, outcome) in titles.iter().zip(outcomes) {
            match outcome {
                Ok(mut results) => {
                    debug!(provider = %request.provider, title = %title, hits = results.len(), "Search returned");
                    hydrate_ratings(title, &mut results);
                    merge_results(&mut merged, results);
                }
                Err(e) => {
                    warn!(provider = %request.provider, title = %title, error = %e, "Search failed");
                    failures += 1;
                    if e.is_timeout() {
                        timeouts += 1;
                    }
                    last_error = Some(e);
                }
            }
        }

        if merged.is_empty() {
            return match last_error {
                Some(err) if failures == titles.len() && timeouts == failures => {
                    Err(ResolveError::SearchTimeout(err))
                }
                last_error => Err(empty_search_error(kind, last_error)),
            };
        }

        let best = select_best(&merged)?.clone();
        info!(
            provider = %request.provider,
            media_id = request.media_id,
            external_id = %best.external_id,
            title = %best.title,
            rating = best.rating,
            "Selected search result"
        );
        Ok(best)
    }

    async fn read_cached<T: ProviderItem>(&self, key: &BucketKey) -> Option<Container<T>> {
        let bucket = Bucket::for_key(key, self.ttl);
        match get_typed::<Container<T>>(self.cache.as_ref(), &bucket, &key.entry_key()).await {
            Ok(Some(container)) => {
                debug!(bucket = %key, "Cache hit");
                Some(container)
            }
            Ok(None) => {
                debug!(bucket = %key, "Cache miss");
                None
            }
            Err(e) => {
                warn!(bucket = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn write_cache<T: ProviderItem>(&self, key: &BucketKey, container: &Container<T>) {
        if container.is_empty() {
            debug!(bucket = %key, "Empty container, not caching");
            return;
        }

        let bucket = Bucket::for_key(key, self.ttl);
        match set_typed(self.cache.as_ref(), &bucket, &key.entry_key(), container).await {
            Ok(()) => {
                debug!(bucket = %key, items = container.items.len(), "Cached container");
                if key.kind == ContentKind::Chapters {
                    self.invalidate_latest_numbers().await;
                }
            }
            Err(e) => warn!(bucket = %key, error = %e, "Cache write failed"),
        }
    }

    /// Run `work` while holding the bucket's in-flight lock
    async fn single_flight<R, Fut>(&self, key: &BucketKey, work: Fut) -> R
    where
        Fut: Future<Output = R>,
    {
        let name = key.to_string();
        let lock = Arc::clone(self.in_flight.entry(name.clone()).or_default().value());

        let result = {
            let _guard = lock.lock().await;
            work.await
        };

        drop(lock);
        self.in_flight
            .remove_if(&name, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    fn emit_resolved(&self, key: &BucketKey, item_count: usize, source: ResolutionSource) {
        self.events.emit_lossy(TsundokuEvent::ContainerResolved {
            provider: key.provider.clone(),
            media_id: key.media_id,
            content_kind: key.kind.to_string(),
            item_count,
            source,
            timestamp: tdk_common::time::now(),
        });
    }
}

fn is_episode_kind(kind: ContentKind) -> bool {
    matches!(kind, ContentKind::Episodes | ContentKind::DubbedEpisodes)
}

fn fetch_error(kind: ContentKind, e: ProviderError) -> ResolveError {
    match kind {
        ContentKind::Chapters => ResolveError::NoChapters(e),
        ContentKind::Volumes => ResolveError::NoVolumes(e),
        ContentKind::Episodes | ContentKind::DubbedEpisodes => {
            ResolveError::NoEpisodes { source: Some(e) }
        }
    }
}

fn empty_search_error(kind: ContentKind, last_error: Option<ProviderError>) -> ResolveError {
    if is_episode_kind(kind) {
        ResolveError::NoAnimeFound { last_error }
    } else {
        ResolveError::NoResults { last_error }
    }
}

/// Trimmed, de-duplicated (by normalized form), mostly-Latin titles in input order
fn searchable_titles(titles: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut kept = Vec::new();

    for title in titles {
        let title = title.trim();
        let normalized = normalize(title);
        if normalized.is_empty() || seen.contains(&normalized) {
            continue;
        }
        seen.push(normalized);

        if is_mostly_latin(title) {
            kept.push(title.to_string());
        }
    }
    kept
}

/// Append results not seen yet; a repeat keeps its first position and its best rating
fn merge_results(merged: &mut Vec<SearchResult>, results: Vec<SearchResult>) {
    for result in results {
        match merged
            .iter_mut()
            .find(|r| r.external_id == result.external_id)
        {
            Some(existing) => {
                if result.rating > existing.rating {
                    existing.rating = result.rating;
                }
            }
            None => merged.push(result),
        }
    }
}

//! Scriptable providers that count their calls

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tdk_resolver::providers::{
    ChapterDetails, EpisodeDetails, MangaProvider, OnlinestreamProvider, ProviderSettings,
    SearchOptions, SearchResult, VolumeDetails,
};
use tdk_resolver::ProviderError;

/// Chapter item as a provider would report it
pub fn chapter(number: &str, index: u32) -> ChapterDetails {
    ChapterDetails {
        provider: "mislabelled".to_string(),
        id: format!("ch-{}", number),
        title: format!("Chapter {}", number),
        chapter: number.to_string(),
        index,
        url: None,
        scanlator: Some("GroupA".to_string()),
        language: Some("en".to_string()),
        updated_at: None,
    }
}

pub fn episode(number: u32) -> EpisodeDetails {
    EpisodeDetails {
        provider: "mislabelled".to_string(),
        id: format!("ep-{}", number),
        number,
        title: None,
        url: None,
    }
}

/// Manga provider answering from fixed tables
#[derive(Default)]
pub struct MockManga {
    results: Mutex<HashMap<String, Vec<SearchResult>>>,
    search_errors: Mutex<HashMap<String, fn() -> ProviderError>>,
    chapters: Mutex<HashMap<String, Vec<ChapterDetails>>>,
    volumes: Mutex<HashMap<String, Vec<VolumeDetails>>>,
    fetch_delay: Mutex<Option<Duration>>,
    pub search_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    fetched_ids: Mutex<Vec<String>>,
}

impl MockManga {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(self, query: &str, results: Vec<SearchResult>) -> Self {
        self.results.lock().unwrap().insert(query.to_string(), results);
        self
    }

    pub fn with_search_error(self, query: &str, error: fn() -> ProviderError) -> Self {
        self.search_errors
            .lock()
            .unwrap()
            .insert(query.to_string(), error);
        self
    }

    pub fn with_chapters(self, external_id: &str, chapters: Vec<ChapterDetails>) -> Self {
        self.set_chapters(external_id, chapters);
        self
    }

    pub fn with_volumes(self, external_id: &str, volumes: Vec<VolumeDetails>) -> Self {
        self.volumes
            .lock()
            .unwrap()
            .insert(external_id.to_string(), volumes);
        self
    }

    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        *self.fetch_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Replace what a later fetch returns
    pub fn set_chapters(&self, external_id: &str, chapters: Vec<ChapterDetails>) {
        self.chapters
            .lock()
            .unwrap()
            .insert(external_id.to_string(), chapters);
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn fetched_ids(&self) -> Vec<String> {
        self.fetched_ids.lock().unwrap().clone()
    }

    async fn record_fetch(&self, external_id: &str) {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched_ids.lock().unwrap().push(external_id.to_string());
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl MangaProvider for MockManga {
    async fn search(&self, options: &SearchOptions) -> Result<Vec<SearchResult>, ProviderError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.search_errors.lock().unwrap().get(&options.query) {
            return Err(error());
        }
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(&options.query)
            .cloned()
            .unwrap_or_default())
    }

    async fn find_chapters(&self, external_id: &str) -> Result<Vec<ChapterDetails>, ProviderError> {
        self.record_fetch(external_id).await;
        self.chapters
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(external_id.to_string()))
    }

    async fn find_volumes(&self, external_id: &str) -> Result<Vec<VolumeDetails>, ProviderError> {
        self.record_fetch(external_id).await;
        self.volumes
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .ok_or(ProviderError::Unsupported("volumes"))
    }

    fn settings(&self) -> ProviderSettings {
        ProviderSettings::default()
    }
}

/// Streaming provider answering from fixed tables
#[derive(Default)]
pub struct MockStream {
    results: Mutex<HashMap<String, Vec<SearchResult>>>,
    episodes: Mutex<HashMap<String, Vec<EpisodeDetails>>>,
    pub search_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    dubbed_searches: AtomicUsize,
    subbed_only: bool,
}

impl MockStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(self, query: &str, results: Vec<SearchResult>) -> Self {
        self.results.lock().unwrap().insert(query.to_string(), results);
        self
    }

    pub fn with_episodes(self, external_id: &str, episodes: Vec<EpisodeDetails>) -> Self {
        self.episodes
            .lock()
            .unwrap()
            .insert(external_id.to_string(), episodes);
        self
    }

    /// Report no dub support
    pub fn subbed_only(mut self) -> Self {
        self.subbed_only = true;
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn dubbed_searches(&self) -> usize {
        self.dubbed_searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OnlinestreamProvider for MockStream {
    async fn search(&self, options: &SearchOptions) -> Result<Vec<SearchResult>, ProviderError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if options.dubbed {
            self.dubbed_searches.fetch_add(1, Ordering::SeqCst);
        }
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(&options.query)
            .cloned()
            .unwrap_or_default())
    }

    async fn find_episodes(&self, external_id: &str) -> Result<Vec<EpisodeDetails>, ProviderError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .episodes
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .unwrap_or_default())
    }

    fn settings(&self) -> ProviderSettings {
        ProviderSettings {
            supports_dub: !self.subbed_only,
        }
    }
}

//! Adapters giving the pipeline one search/fetch interface per item type

use crate::error::ProviderError;
use crate::providers::{
    ChapterDetails, EpisodeDetails, MangaProvider, OnlinestreamProvider, SearchOptions,
    SearchResult, VolumeDetails,
};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub(crate) trait ContentSource<T: Send>: Send + Sync {
    async fn search(&self, options: &SearchOptions) -> Result<Vec<SearchResult>, ProviderError>;

    async fn fetch(&self, external_id: &str) -> Result<Vec<T>, ProviderError>;
}

pub(crate) struct ChapterSource(pub Arc<dyn MangaProvider>);

pub(crate) struct VolumeSource(pub Arc<dyn MangaProvider>);

pub(crate) struct EpisodeSource(pub Arc<dyn OnlinestreamProvider>);

#[async_trait]
impl ContentSource<ChapterDetails> for ChapterSource {
    async fn search(&self, options: &SearchOptions) -> Result<Vec<SearchResult>, ProviderError> {
        self.0.search(options).await
    }

    async fn fetch(&self, external_id: &str) -> Result<Vec<ChapterDetails>, ProviderError> {
        self.0.find_chapters(external_id).await
    }
}

#[async_trait]
impl ContentSource<VolumeDetails> for VolumeSource {
    async fn search(&self, options: &SearchOptions) -> Result<Vec<SearchResult>, ProviderError> {
        self.0.search(options).await
    }

    async fn fetch(&self, external_id: &str) -> Result<Vec<VolumeDetails>, ProviderError> {
        self.0.find_volumes(external_id).await
    }
}

#[async_trait]
impl ContentSource<EpisodeDetails> for EpisodeSource {
    async fn search(&self, options: &SearchOptions) -> Result<Vec<SearchResult>, ProviderError> {
        self.0.search(options).await
    }

    async fn fetch(&self, external_id: &str) -> Result<Vec<EpisodeDetails>, ProviderError> {
        self.0.find_episodes(external_id).await
    }
}

//! Provider capability interfaces and the item types they produce
//!
//! A provider is any content source (remote scraper, API client, local
//! archive reader). Manga providers supply chapters and volumes, streaming
//! providers supply episodes. Both search with the same [`SearchOptions`]
//! and return the same [`SearchResult`] shape so one matcher ranks both.

pub mod catalog;
pub mod filename;
pub mod local_storage;

pub use catalog::{Catalog, CatalogArchive, CatalogIndexer, CatalogSeries, IndexStatus, StopReason};
pub use local_storage::{LocalStorageProvider, LOCAL_STORAGE_PROVIDER};

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Query sent to a provider's search endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub query: String,
    pub year: Option<i32>,
    /// Streaming providers only: search the dubbed catalog
    #[serde(default)]
    pub dubbed: bool,
}

/// One hit from a provider search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Provider-side identifier used to fetch content
    pub external_id: String,
    pub title: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    /// Similarity to the query in [0, 1]; 0 means not yet scored
    #[serde(default)]
    pub rating: f64,
}

impl SearchResult {
    pub fn new(external_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            synonyms: Vec::new(),
            year: None,
            rating: 0.0,
        }
    }

    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms = synonyms.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = rating;
        self
    }
}

/// Capability flags a provider reports about itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Dubbed episode lookups are refused unless set
    pub supports_dub: bool,
}

/// Chapter listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterDetails {
    pub provider: String,
    pub id: String,
    pub title: String,
    /// Chapter number as displayed, e.g. `12` or `12.5`
    pub chapter: String,
    /// Position within the provider's listing
    pub index: u32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub scanlator: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Volume listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeDetails {
    pub provider: String,
    pub id: String,
    /// Zero-padded volume number, e.g. `002`
    pub number: String,
    pub title: String,
    #[serde(default)]
    pub chapters: Vec<ChapterDetails>,
}

/// Episode listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDetails {
    pub provider: String,
    pub id: String,
    pub number: u32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Item type carried by a content container
pub trait ProviderItem: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Overwrite the provider label (nested items included)
    fn set_provider(&mut self, provider: &str);
}

impl ProviderItem for ChapterDetails {
    fn set_provider(&mut self, provider: &str) {
        self.provider = provider.to_string();
    }
}

impl ProviderItem for VolumeDetails {
    fn set_provider(&mut self, provider: &str) {
        self.provider = provider.to_string();
        for chapter in &mut self.chapters {
            chapter.set_provider(provider);
        }
    }
}

impl ProviderItem for EpisodeDetails {
    fn set_provider(&mut self, provider: &str) {
        self.provider = provider.to_string();
    }
}

/// Manga content source
#[async_trait]
pub trait MangaProvider: Send + Sync {
    async fn search(&self, options: &SearchOptions) -> Result<Vec<SearchResult>, ProviderError>;

    async fn find_chapters(&self, external_id: &str) -> Result<Vec<ChapterDetails>, ProviderError>;

    /// Providers without volume grouping keep the default
    async fn find_volumes(&self, _external_id: &str) -> Result<Vec<VolumeDetails>, ProviderError> {
        Err(ProviderError::Unsupported("volumes"))
    }

    fn settings(&self) -> ProviderSettings;
}

/// Streaming (episode) content source
#[async_trait]
pub trait OnlinestreamProvider: Send + Sync {
    async fn search(&self, options: &SearchOptions) -> Result<Vec<SearchResult>, ProviderError>;

    async fn find_episodes(&self, external_id: &str) -> Result<Vec<EpisodeDetails>, ProviderError>;

    fn settings(&self) -> ProviderSettings;
}

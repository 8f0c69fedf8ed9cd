//! Local archive provider
//!
//! Serves a directory of series folders holding `.cbz` chapter archives.
//! All lookups go through the latest catalog snapshot; before the first
//! snapshot is published every call fails fast with a still-indexing error.

use super::catalog::{Catalog, CatalogArchive, CatalogIndexer, CatalogSeries, StopReason};
use super::filename::{normalize_chapter_number, volume_label};
use super::{
    ChapterDetails, MangaProvider, ProviderSettings, SearchOptions, SearchResult, VolumeDetails,
};
use crate::error::ProviderError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tdk_common::config::DEFAULT_SEARCH_TIMEOUT_SECS;
use tdk_common::events::EventBus;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Registry name of the local archive provider
pub const LOCAL_STORAGE_PROVIDER: &str = "local-storage";

/// Minimum Jaro-Winkler similarity for a series to match a query
const MATCH_THRESHOLD: f64 = 0.7;

const ARCHIVE_LANGUAGE: &str = "en";

pub struct LocalStorageProvider {
    indexer: Arc<CatalogIndexer>,
    search_timeout: Duration,
}

impl LocalStorageProvider {
    pub fn new(dir: impl Into<PathBuf>, events: EventBus) -> Self {
        Self {
            indexer: Arc::new(CatalogIndexer::new(dir, LOCAL_STORAGE_PROVIDER, events)),
            search_timeout: Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS),
        }
    }

    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    pub fn indexer(&self) -> &Arc<CatalogIndexer> {
        &self.indexer
    }

    /// Kick off a background catalog build
    pub fn start_indexing(&self) -> JoinHandle<StopReason> {
        self.indexer.spawn()
    }

    fn catalog(&self) -> Result<Arc<Catalog>, ProviderError> {
        self.indexer.snapshot().ok_or_else(|| {
            let status = self.indexer.status();
            ProviderError::still_indexing(status.scanned, status.total)
        })
    }

    fn series<'a>(catalog: &'a Catalog, id: &str) -> Result<&'a CatalogSeries, ProviderError> {
        catalog
            .get(id)
            .ok_or_else(|| ProviderError::NotFound(format!("series directory not found: {}", id)))
    }
}

/// Best series for `query`, or every series when the query is blank
///
/// Stops early once `abandon` fires.
fn match_series(
    catalog: &Catalog,
    query: &str,
    abandon: &CancellationToken,
) -> Vec<SearchResult> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return catalog
            .series
            .iter()
            .map(|s| SearchResult::new(s.id.as_str(), s.title.as_str()))
            .collect();
    }

    let mut best: Option<(&CatalogSeries, f64)> = None;
    for series in &catalog.series {
        if abandon.is_cancelled() {
            return Vec::new();
        }

        let score = strsim::jaro_winkler(&series.title.to_lowercase(), &query);
        if score < MATCH_THRESHOLD {
            continue;
        }
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((series, score));
        }
    }

    best.map(|(series, score)| {
        vec![SearchResult::new(series.id.as_str(), series.title.as_str()).with_rating(score)]
    })
    .unwrap_or_default()
}

fn chapter_details(series: &CatalogSeries, file_name: &str, number: f64, index: u32) -> ChapterDetails {
    let chapter = normalize_chapter_number(number);
    ChapterDetails {
        provider: LOCAL_STORAGE_PROVIDER.to_string(),
        id: format!("{}/{}", series.id, file_name),
        title: format!("Chapter {}", chapter),
        chapter,
        index,
        url: None,
        scanlator: None,
        language: Some(ARCHIVE_LANGUAGE.to_string()),
        updated_at: None,
    }
}

#[async_trait]
impl MangaProvider for LocalStorageProvider {
    async fn search(&self, options: &SearchOptions) -> Result<Vec<SearchResult>, ProviderError> {
        let catalog = self.catalog()?;
        let query = options.query.clone();
        let abandon = CancellationToken::new();
        let worker_abandon = abandon.clone();

        let matching =
            tokio::task::spawn_blocking(move || match_series(&catalog, &query, &worker_abandon));

        match tokio::time::timeout(self.search_timeout, matching).await {
            Ok(Ok(results)) => {
                debug!(query = %options.query, hits = results.len(), "Local catalog search");
                Ok(results)
            }
            Ok(Err(join_error)) => Err(ProviderError::Request(format!(
                "catalog search failed: {}",
                join_error
            ))),
            Err(_) => {
                abandon.cancel();
                warn!(query = %options.query, timeout = ?self.search_timeout, "Local catalog search timed out");
                Err(ProviderError::SearchTimeout(self.search_timeout))
            }
        }
    }

    async fn find_chapters(&self, external_id: &str) -> Result<Vec<ChapterDetails>, ProviderError> {
        let catalog = self.catalog()?;
        let series = Self::series(&catalog, external_id)?;

        let mut archives: Vec<_> = series.archives.iter().collect();
        archives.sort_by(|a, b| a.chapter.total_cmp(&b.chapter));

        Ok(archives
            .into_iter()
            .enumerate()
            .map(|(i, archive)| chapter_details(series, &archive.file_name, archive.chapter, i as u32))
            .collect())
    }

    /// Archives without a volume marker land in volume `000`
    async fn find_volumes(&self, external_id: &str) -> Result<Vec<VolumeDetails>, ProviderError> {
        let catalog = self.catalog()?;
        let series = Self::series(&catalog, external_id)?;

        let mut grouped: Vec<(f64, Vec<&CatalogArchive>)> = Vec::new();
        for archive in &series.archives {
            let volume = archive.volume.unwrap_or(0.0);
            match grouped.iter_mut().find(|(number, _)| *number == volume) {
                Some((_, archives)) => archives.push(archive),
                None => grouped.push((volume, vec![archive])),
            }
        }

        if grouped.is_empty() {
            return Err(ProviderError::NotFound(format!(
                "no volumes found for {}",
                external_id
            )));
        }
        grouped.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(grouped
            .into_iter()
            .map(|(number, mut archives)| {
                archives.sort_by(|a, b| a.chapter.total_cmp(&b.chapter));
                let label = volume_label(number);
                VolumeDetails {
                    provider: LOCAL_STORAGE_PROVIDER.to_string(),
                    id: label.clone(),
                    title: format!("Volume {}", label),
                    number: label,
                    chapters: archives
                        .into_iter()
                        .enumerate()
                        .map(|(i, a)| chapter_details(series, &a.file_name, a.chapter, i as u32))
                        .collect(),
                }
            })
            .collect())
    }

    fn settings(&self) -> ProviderSettings {
        ProviderSettings::default()
    }
}

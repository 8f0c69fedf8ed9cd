//! Refresh of cached chapter containers for series being read

use super::{ContainerRequest, Resolver};
use crate::cache::{BucketKey, CacheError, ContentKind, MANGA_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

/// Reading status of a library entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    Current,
    Repeating,
    Planning,
    Paused,
    Completed,
    Dropped,
}

impl ReadingStatus {
    pub fn is_reading(&self) -> bool {
        matches!(self, ReadingStatus::Current | ReadingStatus::Repeating)
    }
}

/// Library entry as seen by the refresher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub media_id: i64,
    pub titles: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    pub status: ReadingStatus,
}

/// Outcome of a refresh run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefreshReport {
    /// (media_id, provider) pairs refetched successfully
    pub refreshed: Vec<(i64, String)>,
    /// (media_id, provider, error) for failed refetches
    pub failed: Vec<(i64, String, String)>,
    /// Emptied buckets not refetched
    pub skipped: usize,
}

impl Resolver {
    /// Empty every media with a cached chapter container, then refetch the
    /// containers of media being read
    ///
    /// With `selected_providers`, only the provider chosen for each media is
    /// refetched. Each media's buckets are emptied once.
    pub async fn refresh_chapter_containers(
        &self,
        entries: &[LibraryEntry],
        selected_providers: Option<&HashMap<i64, String>>,
    ) -> Result<RefreshReport, CacheError> {
        let mut report = RefreshReport::default();
        let names = self
            .cache
            .bucket_names(&format!("{}_", MANGA_NAMESPACE))
            .await?;

        let mut emptied: BTreeSet<i64> = BTreeSet::new();
        let mut targets: Vec<(&LibraryEntry, String)> = Vec::new();
        for key in names
            .iter()
            .filter_map(|name| BucketKey::parse(name))
            .filter(|key| key.kind == ContentKind::Chapters)
        {
            if emptied.insert(key.media_id) {
                self.empty_cache(key.media_id).await?;
            }

            let entry = entries
                .iter()
                .find(|e| e.media_id == key.media_id && e.status.is_reading());

            let selected = selected_providers
                .map_or(true, |map| map.get(&key.media_id) == Some(&key.provider));

            match entry {
                Some(entry) if selected => targets.push((entry, key.provider)),
                _ => report.skipped += 1,
            }
        }

        for (entry, provider) in targets {
            let mut request = ContainerRequest::new(provider.as_str(), entry.media_id)
                .with_titles(entry.titles.iter().cloned());
            request.year = entry.year;

            match self.get_chapter_container(&request).await {
                Ok(container) => {
                    info!(
                        provider = %provider,
                        media_id = entry.media_id,
                        chapters = container.items.len(),
                        "Refreshed chapter container"
                    );
                    report.refreshed.push((entry.media_id, provider));
                }
                Err(e) => {
                    warn!(provider = %provider, media_id = entry.media_id, error = %e, "Refresh failed");
                    report.failed.push((entry.media_id, provider, e.to_string()));
                }
            }
        }

        Ok(report)
    }
}

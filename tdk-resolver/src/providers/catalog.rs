//! Background catalog indexer for archive libraries
//!
//! The indexer walks `<root>/<series>/**/*.cbz` on a blocking thread and
//! builds a private [`Catalog`]. Only a fully built catalog is published,
//! by swapping one `Arc` under a lock; readers either see the previous
//! snapshot or the new one, never a partial build. Cancellation and panics
//! discard the build and are recorded as the stop reason.

use super::filename::{parse_chapter_number, parse_volume_number};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tdk_common::events::{EventBus, TsundokuEvent};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

pub use tdk_common::events::IndexStopReason as StopReason;

const ARCHIVE_EXTENSION: &str = "cbz";

/// One chapter archive inside a series directory
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogArchive {
    /// Path relative to the series directory, `/`-separated
    pub file_name: String,
    pub chapter: f64,
    pub volume: Option<f64>,
}

/// One series directory
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSeries {
    /// Directory name; doubles as the provider-side ID
    pub id: String,
    pub title: String,
    /// Sorted by file name
    pub archives: Vec<CatalogArchive>,
}

/// Immutable index snapshot
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub series: Vec<CatalogSeries>,
    pub indexed_at: Option<DateTime<Utc>>,
}

impl Catalog {
    pub fn get(&self, id: &str) -> Option<&CatalogSeries> {
        self.series.iter().find(|s| s.id == id)
    }

    pub fn archive_count(&self) -> usize {
        self.series.iter().map(|s| s.archives.len()).sum()
    }
}

/// Progress of the current or last build
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStatus {
    pub scanned: usize,
    pub total: usize,
    /// A snapshot has been published
    pub ready: bool,
    pub stopped: Option<StopReason>,
}

impl IndexStatus {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.scanned.min(self.total) * 100) / self.total) as u8
    }
}

/// Builds and publishes catalog snapshots for one library root
pub struct CatalogIndexer {
    root: PathBuf,
    provider: String,
    snapshot: RwLock<Option<Arc<Catalog>>>,
    scanned: AtomicUsize,
    total: AtomicUsize,
    stopped: Mutex<Option<StopReason>>,
    cancel: CancellationToken,
    events: EventBus,
}

impl CatalogIndexer {
    pub fn new(root: impl Into<PathBuf>, provider: impl Into<String>, events: EventBus) -> Self {
        Self {
            root: root.into(),
            provider: provider.into(),
            snapshot: RwLock::new(None),
            scanned: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            stopped: Mutex::new(None),
            cancel: CancellationToken::new(),
            events,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Latest published snapshot, if any build has completed
    pub fn snapshot(&self) -> Option<Arc<Catalog>> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            scanned: self.scanned.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
            ready: self.snapshot().is_some(),
            stopped: self.stopped.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Start a build in the background
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<StopReason> {
        let indexer = Arc::clone(self);
        tokio::spawn(async move { indexer.run().await })
    }

    pub async fn run(self: Arc<Self>) -> StopReason {
        self.run_with(|_, _| {}).await
    }

    /// Build on a blocking thread, calling `on_progress(scanned, total)`
    /// after each series directory
    pub async fn run_with<F>(self: Arc<Self>, on_progress: F) -> StopReason
    where
        F: FnMut(usize, usize) + Send + 'static,
    {
        info!(provider = %self.provider, root = %self.root.display(), "Catalog indexing started");
        let indexer = Arc::clone(&self);
        let outcome = tokio::task::spawn_blocking(move || indexer.build(on_progress)).await;

        let reason = match outcome {
            Ok(Ok(catalog)) => {
                let series = catalog.series.len();
                let archives = catalog.archive_count();
                self.publish(catalog);
                info!(provider = %self.provider, series, archives, "Catalog snapshot published");
                StopReason::Completed
            }
            Ok(Err(reason)) => reason,
            Err(join_error) if join_error.is_panic() => StopReason::Panicked {
                message: panic_message(join_error.into_panic()),
            },
            Err(join_error) => StopReason::Failed {
                message: join_error.to_string(),
            },
        };

        match &reason {
            StopReason::Completed => {}
            StopReason::Cancelled => {
                warn!(provider = %self.provider, "Catalog indexing cancelled, partial build discarded")
            }
            other => error!(provider = %self.provider, reason = %other, "Catalog indexing stopped"),
        }

        *self.stopped.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason.clone());
        self.events.emit_lossy(TsundokuEvent::CatalogIndexStopped {
            provider: self.provider.clone(),
            reason: reason.clone(),
            timestamp: tdk_common::time::now(),
        });
        reason
    }

    fn publish(&self, catalog: Catalog) {
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(catalog));
    }

    fn build<F>(&self, mut on_progress: F) -> Result<Catalog, StopReason>
    where
        F: FnMut(usize, usize),
    {
        let mut series_dirs: Vec<PathBuf> = std::fs::read_dir(&self.root)
            .map_err(|e| StopReason::Failed {
                message: format!("{}: {}", self.root.display(), e),
            })?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        series_dirs.sort();

        let total = series_dirs.len();
        self.total.store(total, Ordering::SeqCst);
        self.scanned.store(0, Ordering::SeqCst);

        let mut catalog = Catalog::default();
        for (i, dir) in series_dirs.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(StopReason::Cancelled);
            }

            if let Some(series) = scan_series(dir) {
                catalog.series.push(series);
            }

            let scanned = i + 1;
            self.scanned.store(scanned, Ordering::SeqCst);
            self.events.emit_lossy(TsundokuEvent::CatalogIndexProgress {
                provider: self.provider.clone(),
                scanned,
                total,
                timestamp: tdk_common::time::now(),
            });
            on_progress(scanned, total);
        }

        if self.cancel.is_cancelled() {
            return Err(StopReason::Cancelled);
        }

        catalog.indexed_at = Some(tdk_common::time::now());
        Ok(catalog)
    }
}

fn scan_series(dir: &Path) -> Option<CatalogSeries> {
    let id = dir.file_name()?.to_str()?.to_string();
    let mut archives = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error accessing entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_archive(entry.path()) {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let file_name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let stem = entry
            .path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        archives.push(CatalogArchive {
            file_name,
            chapter: parse_chapter_number(&stem).unwrap_or(0.0),
            volume: parse_volume_number(&stem),
        });
    }

    archives.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    debug!(series = %id, archives = archives.len(), "Indexed series");

    Some(CatalogSeries {
        title: id.clone(),
        id,
        archives,
    })
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
        .unwrap_or(false)
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

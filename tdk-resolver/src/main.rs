//! tdk-resolver - content resolution CLI
//!
//! Resolves library entries to provider containers against the local
//! cache database, indexing the configured archive library first.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tdk_common::config::{self, RootFolderResolver};
use tdk_common::events::EventBus;
use tdk_resolver::cache::SqliteCacheStore;
use tdk_resolver::mapping::{ManualMapping, MappingStore, SqliteMappingStore};
use tdk_resolver::providers::{LocalStorageProvider, LOCAL_STORAGE_PROVIDER};
use tdk_resolver::{ContainerRequest, Hooks, ProviderRegistry, Resolver};

/// Command-line arguments for tdk-resolver
#[derive(Parser, Debug)]
#[command(name = "tdk-resolver")]
#[command(about = "Resolve library media to provider content")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "TDK_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the cache database
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Archive library served by the local-storage provider
    #[arg(long, env = "TDK_LIBRARY")]
    library: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, env = "TDK_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct Lookup {
    /// Library media ID
    media_id: i64,

    /// Candidate title, in preference order (repeatable)
    #[arg(long = "title")]
    titles: Vec<String>,

    #[arg(long)]
    year: Option<i32>,

    #[arg(long, default_value = LOCAL_STORAGE_PROVIDER)]
    provider: String,
}

impl Lookup {
    fn request(&self) -> ContainerRequest {
        let mut request = ContainerRequest::new(self.provider.as_str(), self.media_id)
            .with_titles(self.titles.iter().cloned());
        request.year = self.year;
        request
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the chapter container of a media entry
    Chapters(Lookup),
    /// Resolve the volume container of a media entry
    Volumes(Lookup),
    /// Latest cached chapter number per media
    Latest,
    /// Drop every cached container of a media entry
    Invalidate { media_id: i64 },
    /// Bind a media entry to a provider's external ID
    Map {
        provider: String,
        media_id: i64,
        external_id: String,
        /// Remove the mapping instead
        #[arg(long)]
        remove: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = config::load_or_default(args.config.as_deref());

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| toml_config.logging.level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("tdk_resolver={level},tdk_common={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder.clone())
        .with_toml(&toml_config)
        .resolve();
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;

    let db_path = root_folder.join(tdk_common::db::DATABASE_FILE);
    info!("Database: {}", db_path.display());
    let pool = tdk_common::db::init_database(&db_path)
        .await
        .context("Failed to open cache database")?;

    let cache = Arc::new(SqliteCacheStore::new(pool.clone()));
    match cache.purge_expired().await {
        Ok(0) => {}
        Ok(purged) => info!(purged, "Purged expired cache entries"),
        Err(e) => warn!(error = %e, "Could not purge expired cache entries"),
    }
    let mappings = Arc::new(SqliteMappingStore::new(pool));

    let events = EventBus::default();
    let registry = Arc::new(ProviderRegistry::new());

    if let Some(library) = toml_config.local_storage_with_dir(args.library.clone()) {
        let provider = LocalStorageProvider::new(&library.dir, events.clone())
            .with_search_timeout(library.search_timeout());
        let reason = provider
            .start_indexing()
            .await
            .context("Catalog indexer task failed")?;
        if !reason.is_completed() {
            warn!(library = %library.dir.display(), reason = %reason, "Archive library not indexed");
        }
        registry
            .register_manga(LOCAL_STORAGE_PROVIDER, Arc::new(provider))
            .context("Failed to register local-storage provider")?;
    }

    let resolver = Resolver::new(registry, mappings.clone(), cache, Arc::new(Hooks::new()))
        .with_ttl(toml_config.cache.ttl())
        .with_event_bus(events);

    match args.command {
        Command::Chapters(lookup) => {
            let container = resolver
                .get_chapter_container(&lookup.request())
                .await
                .with_context(|| format!("Failed to resolve chapters for {}", lookup.media_id))?;
            print_json(&container)?;
        }
        Command::Volumes(lookup) => {
            let container = resolver
                .get_volume_container(&lookup.request())
                .await
                .with_context(|| format!("Failed to resolve volumes for {}", lookup.media_id))?;
            print_json(&container)?;
        }
        Command::Latest => {
            let numbers = resolver
                .latest_chapter_numbers()
                .await
                .context("Failed to compute latest chapter numbers")?;
            print_json(&numbers)?;
        }
        Command::Invalidate { media_id } => {
            let removed = resolver
                .empty_cache(media_id)
                .await
                .context("Failed to empty media cache")?;
            print_json(&serde_json::json!({ "media_id": media_id, "buckets_removed": removed }))?;
        }
        Command::Map {
            provider,
            media_id,
            external_id,
            remove,
        } => {
            if remove {
                let removed = mappings
                    .remove(&provider, media_id)
                    .await
                    .context("Failed to remove mapping")?;
                print_json(&serde_json::json!({ "removed": removed }))?;
            } else {
                let mapping = ManualMapping {
                    provider,
                    media_id,
                    external_id,
                };
                mappings
                    .upsert(&mapping)
                    .await
                    .context("Failed to save mapping")?;
                print_json(&mapping)?;
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

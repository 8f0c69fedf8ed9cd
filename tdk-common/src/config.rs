//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a small TOML file. The root folder (where
//! the SQLite database lives) is resolved in priority order:
//! 1. Command-line argument
//! 2. `TDK_ROOT_FOLDER` environment variable
//! 3. `root_folder` in the TOML file
//! 4. OS-dependent compiled default
//!
//! A missing or unreadable TOML file never aborts startup; defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "TDK_ROOT_FOLDER";

/// Default TTL for provider content buckets
pub const DEFAULT_CACHE_TTL_DAYS: u32 = 7;

/// Default hard limit for catalog-scan searches
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 5;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Folder holding `tsundoku.db`
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Enables the `local-storage` provider when present
    #[serde(default)]
    pub local_storage: Option<LocalStorageConfig>,
}

impl TomlConfig {
    /// Local archive settings with an optional library directory override
    ///
    /// The override enables the provider even without a `[local_storage]`
    /// section; the file's search timeout still applies when present.
    pub fn local_storage_with_dir(&self, dir: Option<PathBuf>) -> Option<LocalStorageConfig> {
        match (dir, &self.local_storage) {
            (Some(dir), Some(cfg)) => Some(LocalStorageConfig {
                dir,
                search_timeout_secs: cfg.search_timeout_secs,
            }),
            (Some(dir), None) => Some(LocalStorageConfig {
                dir,
                search_timeout_secs: DEFAULT_SEARCH_TIMEOUT_SECS,
            }),
            (None, cfg) => cfg.clone(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Provider content cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_ttl_days(),
        }
    }
}

impl CacheConfig {
    /// Bucket TTL as a chrono duration
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.ttl_days))
    }
}

/// Local archive provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalStorageConfig {
    /// Library directory: one sub-directory per series, `.cbz` chapters inside
    pub dir: PathBuf,

    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,
}

impl LocalStorageConfig {
    pub fn search_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.search_timeout_secs)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ttl_days() -> u32 {
    DEFAULT_CACHE_TTL_DAYS
}

fn default_search_timeout_secs() -> u64 {
    DEFAULT_SEARCH_TIMEOUT_SECS
}

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: default_log_level(),
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/tsundoku
        dirs::data_local_dir()
            .map(|d| d.join("tsundoku"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/tsundoku"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/tsundoku
        dirs::data_dir()
            .map(|d| d.join("tsundoku"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/tsundoku"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\tsundoku
        dirs::data_local_dir()
            .map(|d| d.join("tsundoku"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\tsundoku"))
    } else {
        PathBuf::from("./tsundoku_data")
    }
}

/// Default configuration file path: `<config_dir>/tsundoku/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tsundoku").join("config.toml"))
}

/// Root folder resolution following the CLI → ENV → TOML → default order
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml: Option<TomlConfig>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml = Some(config.clone());
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(path = %path.display(), "Root folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.is_empty() {
                debug!(path = %path, "Root folder from {}", ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = self.toml.as_ref().and_then(|c| c.root_folder.clone()) {
            debug!(path = %path.display(), "Root folder from TOML config");
            return path;
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Load the config at `path` (or the default location), falling back to
/// defaults with a warning when the file is missing or malformed
pub fn load_or_default(path: Option<&Path>) -> TomlConfig {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(p) => p,
        None => {
            warn!("Could not determine config directory, using defaults");
            return TomlConfig::default();
        }
    };

    if !path.exists() {
        debug!(path = %path.display(), "No config file, using defaults");
        return TomlConfig::default();
    }

    match load_toml_config(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
            TomlConfig::default()
        }
    }
}

/// Write a config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

//! Error types for tdk-resolver
//!
//! [`ResolveError`] is what callers of the resolver see. Provider failures
//! ([`ProviderError`]) and handler failures ([`HookError`]) are never
//! returned bare; they are chained as the `source` of a resolve error.

use crate::registry::Capability;
use std::time::Duration;
use thiserror::Error;

/// Result type for resolver operations
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Error raised by an interception handler
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Pipeline stage an interception handler was attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptionStage {
    Requested,
    Produced,
    /// Latest-number aggregate, fired before it is memoized
    Aggregate,
}

impl std::fmt::Display for InterceptionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterceptionStage::Requested => write!(f, "requested"),
            InterceptionStage::Produced => write!(f, "produced"),
            InterceptionStage::Aggregate => write!(f, "aggregate"),
        }
    }
}

/// Resolution failure taxonomy
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No mapping exists and the request carried no titles
    #[error("No titles provided")]
    NoTitlesProvided,

    /// Every title search came back empty or failed
    #[error("No search results")]
    NoResults {
        #[source]
        last_error: Option<ProviderError>,
    },

    #[error("No chapters found")]
    NoChapters(#[source] ProviderError),

    #[error("No volumes found")]
    NoVolumes(#[source] ProviderError),

    /// Episode fetch failed or returned nothing
    #[error("No episodes found")]
    NoEpisodes {
        #[source]
        source: Option<ProviderError>,
    },

    /// Streaming search found no matching series
    #[error("No anime found")]
    NoAnimeFound {
        #[source]
        last_error: Option<ProviderError>,
    },

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// Registered handle does not carry the requested capability
    #[error("Provider '{provider}' is not a {expected} provider")]
    InvalidExtensionType {
        provider: String,
        expected: Capability,
    },

    /// Searches timed out or hit a catalog that is still indexing
    #[error("Search timed out: {0}")]
    SearchTimeout(#[source] ProviderError),

    /// An interception handler failed; the resolution was aborted
    #[error("Interception handler failed at {stage} stage")]
    Interception {
        stage: InterceptionStage,
        #[source]
        source: HookError,
    },

    /// Provider names are embedded in cache keys and may not contain separators
    #[error("Invalid provider name: {0}")]
    InvalidProviderName(String),
}

/// Provider-level failure
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport or upstream failure
    #[error("Request failed: {0}")]
    Request(String),

    /// External ID unknown to the provider
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    /// Catalog comparison abandoned after the hard limit
    #[error("Search timed out after {0:?}")]
    SearchTimeout(Duration),

    /// No catalog snapshot published yet
    #[error("Still indexing: {percent}% ({scanned}/{total})")]
    StillIndexing {
        scanned: usize,
        total: usize,
        percent: u8,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub fn still_indexing(scanned: usize, total: usize) -> Self {
        let percent = if total == 0 {
            0
        } else {
            ((scanned.min(total) * 100) / total) as u8
        };
        ProviderError::StillIndexing {
            scanned,
            total,
            percent,
        }
    }

    /// True for failures that mean "try again later" rather than "no match"
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ProviderError::SearchTimeout(_) | ProviderError::StillIndexing { .. }
        )
    }
}

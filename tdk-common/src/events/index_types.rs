//! Supporting types for resolution and catalog indexing events

use serde::{Deserialize, Serialize};

/// Where a resolved container came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Served from a live cache bucket
    Cache,
    /// External ID came from a manual mapping
    Mapping,
    /// External ID came from ranking provider search results
    Search,
    /// An interception handler supplied the container
    Interception,
}

/// Why a background catalog build stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IndexStopReason {
    /// Snapshot fully built and published
    Completed,
    /// Cancellation token fired; partial work discarded
    Cancelled,
    /// Walk failed with an error
    Failed { message: String },
    /// Build task panicked
    Panicked { message: String },
}

impl IndexStopReason {
    pub fn is_completed(&self) -> bool {
        matches!(self, IndexStopReason::Completed)
    }
}

impl std::fmt::Display for IndexStopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexStopReason::Completed => write!(f, "completed"),
            IndexStopReason::Cancelled => write!(f, "cancelled"),
            IndexStopReason::Failed { message } => write!(f, "failed: {}", message),
            IndexStopReason::Panicked { message } => write!(f, "panicked: {}", message),
        }
    }
}

//! Application events and the EventBus
//!
//! The resolver and the catalog indexers publish [`TsundokuEvent`]s for
//! observers (CLI progress output, diagnostics). Publishing never blocks and
//! never fails the operation that produced the event.

mod index_types;

pub use index_types::{IndexStopReason, ResolutionSource};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Tsundoku event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum TsundokuEvent {
    /// A content container was returned to a caller
    ContainerResolved {
        provider: String,
        media_id: i64,
        /// `chapters`, `volumes`, `episodes` or `episodes-dub`
        content_kind: String,
        item_count: usize,
        source: ResolutionSource,
        timestamp: DateTime<Utc>,
    },

    /// Buckets were purged for a media entry
    CacheInvalidated {
        media_id: i64,
        buckets_removed: usize,
        timestamp: DateTime<Utc>,
    },

    /// Periodic catalog build progress
    CatalogIndexProgress {
        provider: String,
        scanned: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// A catalog build finished, for whatever reason
    CatalogIndexStopped {
        provider: String,
        reason: IndexStopReason,
        timestamp: DateTime<Utc>,
    },
}

/// Central event distribution bus over a tokio broadcast channel
///
/// Slow subscribers lag and lose the oldest events; they never slow emitters.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TsundokuEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    ///
    /// # Examples
    ///
    /// ```
    /// use tdk_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<TsundokuEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TsundokuEvent,
    ) -> Result<usize, broadcast::error::SendError<TsundokuEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TsundokuEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

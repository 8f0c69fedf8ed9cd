//! Interception bus
//!
//! External code observes or overrides pipeline stages by registering
//! handlers. Handlers run synchronously in registration order and may mutate
//! the event. The first handler error stops dispatch and is returned.
//! Dispatch runs over a snapshot of the handler list, so a handler may
//! register further handlers; they take effect from the next trigger.
//!
//! Setting `default_prevented` on a Requested event makes the resolver return
//! the handler's container without searching, fetching or caching. On a
//! Produced event it makes the resolver return the (possibly mutated)
//! container verbatim and skip the cache write.

use crate::error::HookError;
use crate::providers::{ChapterDetails, EpisodeDetails, VolumeDetails};
use crate::resolver::{Container, LatestNumber};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

type Handler<E> = Arc<dyn Fn(&mut E) -> Result<(), HookError> + Send + Sync>;

/// Ordered handler list for one event type
pub struct InterceptionBus<E> {
    handlers: RwLock<Vec<Handler<E>>>,
}

impl<E> Default for InterceptionBus<E> {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }
}

impl<E> InterceptionBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; it runs after every handler registered before it
    pub fn register<F>(&self, handler: F)
    where
        F: Fn(&mut E) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(handler));
    }

    /// Run handlers in order, stopping at the first error
    pub fn trigger(&self, event: &mut E) -> Result<(), HookError> {
        let handlers: Vec<Handler<E>> = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for handler in &handlers {
            handler(event)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fired before the cache lookup of a resolution
#[derive(Debug, Clone)]
pub struct RequestedEvent<T> {
    pub provider: String,
    pub media_id: i64,
    pub titles: Vec<String>,
    pub year: Option<i32>,
    /// Empty unless a handler fills it in
    pub container: Container<T>,
    pub default_prevented: bool,
}

/// Fired with the container about to be returned (cached or freshly fetched)
#[derive(Debug, Clone)]
pub struct ProducedEvent<T> {
    pub provider: String,
    pub media_id: i64,
    pub titles: Vec<String>,
    pub year: Option<i32>,
    pub container: Container<T>,
    /// Container came from a live cache bucket
    pub from_cache: bool,
    pub default_prevented: bool,
}

impl<T> RequestedEvent<T> {
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }
}

impl<T> ProducedEvent<T> {
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }
}

/// Fired with the freshly computed latest-number aggregate before it is memoized
#[derive(Debug, Clone, Default)]
pub struct LatestNumbersEvent {
    pub numbers: BTreeMap<i64, Vec<LatestNumber>>,
}

/// Requested/Produced buses for one item type
pub struct ContainerHooks<T> {
    pub requested: InterceptionBus<RequestedEvent<T>>,
    pub produced: InterceptionBus<ProducedEvent<T>>,
}

impl<T> Default for ContainerHooks<T> {
    fn default() -> Self {
        Self {
            requested: InterceptionBus::new(),
            produced: InterceptionBus::new(),
        }
    }
}

/// Every interception point of the resolver
#[derive(Default)]
pub struct Hooks {
    pub chapters: ContainerHooks<ChapterDetails>,
    pub volumes: ContainerHooks<VolumeDetails>,
    pub episodes: ContainerHooks<EpisodeDetails>,
    pub latest_numbers: InterceptionBus<LatestNumbersEvent>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }
}

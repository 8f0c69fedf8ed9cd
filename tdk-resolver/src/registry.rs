//! Typed provider registry
//!
//! Built at startup and handed to the resolver. Each name maps to exactly
//! one capability-tagged handle; asking for a capability the handle does not
//! carry is a typed failure rather than a runtime downcast.

use crate::error::{ResolveError, ResolveResult};
use crate::providers::{MangaProvider, OnlinestreamProvider};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// What a registered provider can supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Manga,
    Onlinestream,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Manga => write!(f, "manga"),
            Capability::Onlinestream => write!(f, "onlinestream"),
        }
    }
}

/// Capability-tagged provider handle
#[derive(Clone)]
pub enum ProviderHandle {
    Manga(Arc<dyn MangaProvider>),
    Onlinestream(Arc<dyn OnlinestreamProvider>),
}

impl ProviderHandle {
    pub fn capability(&self) -> Capability {
        match self {
            ProviderHandle::Manga(_) => Capability::Manga,
            ProviderHandle::Onlinestream(_) => Capability::Onlinestream,
        }
    }
}

impl std::fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProviderHandle({})", self.capability())
    }
}

/// Named provider handles
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, ProviderHandle>>,
}

/// Provider names end up inside cache keys (`_`) and entry keys (`$`)
fn validate_name(name: &str) -> ResolveResult<()> {
    let valid = !name.is_empty()
        && !name
            .chars()
            .any(|c| c == '_' || c == '$' || c.is_whitespace());

    if valid {
        Ok(())
    } else {
        Err(ResolveError::InvalidProviderName(name.to_string()))
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking writer cannot leave the map half-updated, so poisoning is ignored
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ProviderHandle>> {
        self.providers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ProviderHandle>> {
        self.providers.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register (or replace) a provider; returns the handle it replaced
    pub fn register(
        &self,
        name: &str,
        handle: ProviderHandle,
    ) -> ResolveResult<Option<ProviderHandle>> {
        validate_name(name)?;
        info!(provider = %name, capability = %handle.capability(), "Registering provider");
        Ok(self.write().insert(name.to_string(), handle))
    }

    pub fn register_manga(
        &self,
        name: &str,
        provider: Arc<dyn MangaProvider>,
    ) -> ResolveResult<Option<ProviderHandle>> {
        self.register(name, ProviderHandle::Manga(provider))
    }

    pub fn register_onlinestream(
        &self,
        name: &str,
        provider: Arc<dyn OnlinestreamProvider>,
    ) -> ResolveResult<Option<ProviderHandle>> {
        self.register(name, ProviderHandle::Onlinestream(provider))
    }

    pub fn remove(&self, name: &str) -> Option<ProviderHandle> {
        let removed = self.write().remove(name);
        if removed.is_some() {
            debug!(provider = %name, "Removed provider");
        }
        removed
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get(&self, name: &str) -> Option<ProviderHandle> {
        self.read().get(name).cloned()
    }

    pub fn manga(&self, name: &str) -> ResolveResult<Arc<dyn MangaProvider>> {
        match self.get(name) {
            Some(ProviderHandle::Manga(provider)) => Ok(provider),
            Some(_) => Err(ResolveError::InvalidExtensionType {
                provider: name.to_string(),
                expected: Capability::Manga,
            }),
            None => Err(ResolveError::ProviderNotFound(name.to_string())),
        }
    }

    pub fn onlinestream(&self, name: &str) -> ResolveResult<Arc<dyn OnlinestreamProvider>> {
        match self.get(name) {
            Some(ProviderHandle::Onlinestream(provider)) => Ok(provider),
            Some(_) => Err(ResolveError::InvalidExtensionType {
                provider: name.to_string(),
                expected: Capability::Onlinestream,
            }),
            None => Err(ResolveError::ProviderNotFound(name.to_string())),
        }
    }
}

//! tdk-resolver library interface
//!
//! Resolves library media entries to provider content containers
//! (chapters, volumes, episodes) and caches the results.

pub mod cache;
pub mod error;
pub mod hooks;
pub mod mapping;
pub mod matcher;
pub mod providers;
pub mod registry;
pub mod resolver;

pub use crate::error::{InterceptionStage, ProviderError, ResolveError, ResolveResult};
pub use crate::hooks::Hooks;
pub use crate::registry::{Capability, ProviderHandle, ProviderRegistry};
pub use crate::resolver::{Container, ContainerRequest, Resolver};

//! # Tsundoku Common Library
//!
//! Shared code for the Tsundoku workspace:
//! - Error type and `Result` alias
//! - Configuration loading and root folder resolution
//! - SQLite initialization for the mapping and cache tables
//! - Application events (TsundokuEvent) and the broadcast EventBus
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};

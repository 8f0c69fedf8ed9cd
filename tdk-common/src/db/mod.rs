//! SQLite setup for the manual mapping and cache tables

pub mod init;

pub use init::*;

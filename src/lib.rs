//! # pkgvault
//!
//! A private package index with per-distribution access control and
//! curated custom indexes, usable both as a standalone binary and as a
//! library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! pkgvault = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pkgvault::registry::Registry;
//! use pkgvault::security::EnforcingPolicy;
//! use pkgvault::server::{AppState, create_router};
//! use pkgvault::storage::ArchiveStorage;
//! use pkgvault::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/pkgvault.db").unwrap();
//! store.initialize().unwrap();
//!
//! let registry = Registry::new(
//!     Arc::new(store),
//!     ArchiveStorage::new("./data/files".as_ref()),
//!     Arc::new(EnforcingPolicy),
//! );
//! let state = Arc::new(AppState::new(Arc::new(registry), None));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes the administrative CLI module. Disable with
//!   `default-features = false`.

pub mod auth;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod registry;
pub mod security;
pub mod server;
pub mod storage;
pub mod store;
pub mod types;
pub mod upstream;
pub mod version;

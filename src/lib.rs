//! # SAKIP
//!
//! A performance-accountability reporting service for government
//! institutions: strategic objectives, programs, activities, performance
//! indicators with yearly targets, periodic performance data with evidence,
//! validation workflows, assessments and reports. Usable both as a standalone
//! binary and as a library.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sakip::config::ServerConfig;
//! use sakip::server::{AppState, create_router};
//! use sakip::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::default();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//! store.seed_defaults().unwrap();
//!
//! let state = Arc::new(AppState::new(Arc::new(store), config));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): builds the `sakip` binary. Disable with `default-features = false`.

pub mod audit;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod evidence;
pub mod export;
pub mod import;
pub mod server;
pub mod settings;
pub mod store;
pub mod types;

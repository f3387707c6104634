//! # hotload-config
//!
//! Hot-reloading configuration files decoded into a value you own.
//!
//! ## Overview
//!
//! A [`Session`](core::Session) ties one configuration file to one shared,
//! caller-owned value:
//! - `ready()` loads the file once and starts watching its directory
//! - bursts of change notifications are coalesced by a two-stage bounce filter
//! - each reload decode-merges the file over the current value, so fields
//!   missing from the file keep what they had
//! - a single replaceable callback runs after every successful reload
//! - a bad file is logged and ignored; the last good values stay in place
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hotload_config::prelude::*;
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct AppConfig {
//!     server: ServerConfig,
//!     log_level: String,
//! }
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct ServerConfig {
//!     port: u16,
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = Arc::new(RwLock::new(AppConfig::default()));
//! let session = Session::new("config.json", Arc::clone(&config));
//!
//! let reader = Arc::clone(&config);
//! session.on_load(move || {
//!     let cfg = reader.read();
//!     println!("port {} at level {}", cfg.server.port, cfg.log_level);
//! });
//!
//! // Initial load plus watching, exactly once
//! session.ready();
//!
//! // ... later
//! session.stop_watching();
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `yaml`: YAML documents via `serde_yaml`
//! - `toml`: TOML documents via `toml`
//! - `all-formats`: both of the above
//! - `metrics`: OpenTelemetry reload metrics
//!
//! ```toml
//! [dependencies]
//! hotload-config = { version = "0.1", features = ["yaml"] }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod sources;
pub mod watch;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{BounceWindow, Session, SessionBuilder, SharedTarget};
    pub use crate::error::{ConfigError, Result};
    pub use crate::sources::Format;
    pub use parking_lot::RwLock;
}

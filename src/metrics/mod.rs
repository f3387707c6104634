//! Built-in metrics for configuration reloads.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Reload attempts/success/failures
//! - Reload duration
//! - Notifications received and deferred by the bounce filter
//! - Configuration age
//!
//! # Examples
//!
//! ```rust,no_run
//! use hotload_config::prelude::*;
//! use opentelemetry::global;
//! use std::sync::Arc;
//!
//! # #[derive(serde::Serialize, serde::Deserialize, Default)] struct AppConfig {}
//! # fn example() -> Result<()> {
//! let meter = global::meter("my-app");
//! let target = Arc::new(RwLock::new(AppConfig::default()));
//!
//! let session = Session::builder("config.json", target)
//!     .with_metrics(meter)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod config_metrics;

pub use config_metrics::ConfigMetrics;

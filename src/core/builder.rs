//! Builder for constructing Session instances.

use crate::core::debounce::BounceWindow;
use crate::core::session::{Session, SessionParts, SharedTarget, default_source};
use crate::error::{ConfigError, Result};
use crate::sources::Format;
use crate::watch::WatchSource;
use serde::{Serialize, de::DeserializeOwned};
use std::path::PathBuf;

#[cfg(feature = "metrics")]
use crate::metrics::ConfigMetrics;

type LoadCallback = Box<dyn Fn() + Send + Sync>;

/// How the builder decides which format to parse with.
enum FormatChoice {
    Fixed(Format),
    Detect,
}

/// Builder for a [`Session`] with non-default settings.
///
/// # Examples
///
/// ```rust,no_run
/// use hotload_config::prelude::*;
/// use serde::{Deserialize, Serialize};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct AppConfig {
///     port: u16,
/// }
///
/// # fn example() -> Result<()> {
/// let config = Arc::new(RwLock::new(AppConfig::default()));
///
/// let session = Session::builder("config/app.json", Arc::clone(&config))
///     .with_bounce_window(BounceWindow::new(
///         Duration::from_millis(5),
///         Duration::from_millis(250),
///     )?)
///     .on_load(|| println!("configuration reloaded"))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder<T> {
    path: PathBuf,
    target: SharedTarget<T>,
    format: FormatChoice,
    window: BounceWindow,
    file_watch: bool,
    source: Option<Box<dyn WatchSource>>,
    on_load: Option<LoadCallback>,
    #[cfg(feature = "metrics")]
    meter: Option<opentelemetry::metrics::Meter>,
}

impl<T> SessionBuilder<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a builder for the file at `path`, decoding into `target`.
    pub fn new(path: impl Into<PathBuf>, target: SharedTarget<T>) -> Self {
        Self {
            path: path.into(),
            target,
            format: FormatChoice::Fixed(Format::Json),
            window: BounceWindow::default(),
            file_watch: true,
            source: None,
            on_load: None,
            #[cfg(feature = "metrics")]
            meter: None,
        }
    }

    /// Parse the file with `format`. Defaults to JSON.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = FormatChoice::Fixed(format);
        self
    }

    /// Pick the format from the file extension when building.
    ///
    /// `.yaml`/`.yml` select YAML, `.toml` selects TOML, anything else JSON.
    /// See [`Format::from_path`].
    pub fn with_format_detection(mut self) -> Self {
        self.format = FormatChoice::Detect;
        self
    }

    /// Use a custom bounce window for change notifications.
    pub fn with_bounce_window(mut self, window: BounceWindow) -> Self {
        self.window = window;
        self
    }

    /// Enable or disable file watching. Enabled by default.
    ///
    /// With watching disabled, [`Session::ready`] only performs the initial
    /// load and further loads happen through [`Session::reload`].
    pub fn with_file_watch(mut self, enabled: bool) -> Self {
        self.file_watch = enabled;
        self
    }

    /// Take change notifications from `source` instead of the platform
    /// file watcher.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use hotload_config::prelude::*;
    /// use hotload_config::watch::NotifySource;
    /// use std::sync::Arc;
    ///
    /// # fn example() -> Result<()> {
    /// let target = Arc::new(RwLock::new(serde_json::Map::new()));
    /// let session = Session::builder("config.json", target)
    ///     .with_watch_source(NotifySource::new()?)
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_watch_source<S: WatchSource>(mut self, source: S) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Bind the callback run after each successful reload.
    ///
    /// Same as calling [`Session::on_load`] right after building.
    pub fn on_load<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_load = Some(Box::new(callback));
        self
    }

    /// Record reload metrics with `meter`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.meter = Some(meter);
        self
    }

    /// Build the session.
    ///
    /// Like [`Session::new`], this neither reads nor watches anything yet. If
    /// the platform watcher cannot be created the session is built without
    /// one and the failure is logged.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the path has no file name ([`ConfigError::InvalidPath`])
    /// - format detection picks a format whose feature is disabled
    ///   ([`ConfigError::FeatureNotEnabled`])
    pub fn build(self) -> Result<Session<T>> {
        if self.path.file_name().is_none() {
            return Err(ConfigError::InvalidPath(self.path));
        }

        let format = match self.format {
            FormatChoice::Fixed(format) => format,
            FormatChoice::Detect => Format::from_path(&self.path)?,
        };

        let source = match (self.file_watch, self.source) {
            (false, _) => None,
            (true, Some(source)) => Some(source),
            (true, None) => default_source(),
        };

        let session = Session::from_parts(SessionParts {
            path: self.path,
            target: self.target,
            format,
            window: self.window,
            source,
            #[cfg(feature = "metrics")]
            metrics: self.meter.map(ConfigMetrics::new),
        });

        if let Some(callback) = self.on_load {
            session.on_load(callback);
        }

        Ok(session)
    }
}

impl<T> Session<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a builder for a session on `path`.
    pub fn builder(path: impl Into<PathBuf>, target: SharedTarget<T>) -> SessionBuilder<T> {
        SessionBuilder::new(path, target)
    }
}

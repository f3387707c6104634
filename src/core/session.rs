//! The session handle: one watched file feeding one caller-owned target.

use crate::core::debounce::{BounceWindow, Debouncer, LastReload};
use crate::core::loader::Loader;
use crate::error::{ConfigError, Result};
use crate::sources::Format;
use crate::watch::{NotifySource, WatchSource};
use parking_lot::{Mutex, RwLock};
use serde::{Serialize, de::DeserializeOwned};
use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, info};

#[cfg(feature = "metrics")]
use crate::metrics::ConfigMetrics;

/// The caller-owned value a session decodes into.
///
/// Keep a clone to read the configuration; every reload writes into this same
/// instance.
pub type SharedTarget<T> = Arc<RwLock<T>>;

/// Keeps a running watch alive; dropping it ends the watch.
struct WatchHandle {
    _guard: Box<dyn Any + Send>,
    _shutdown: oneshot::Sender<()>,
}

enum WatchState {
    Idle,
    Active(WatchHandle),
    Stopped,
}

/// Everything needed to put a session together.
pub(crate) struct SessionParts<T> {
    pub(crate) path: PathBuf,
    pub(crate) target: SharedTarget<T>,
    pub(crate) format: Format,
    pub(crate) window: BounceWindow,
    pub(crate) source: Option<Box<dyn WatchSource>>,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Option<ConfigMetrics>,
}

/// A hot-reloading configuration session for a single file.
///
/// A session is inert until [`ready`](Session::ready) is called. The first
/// call loads the file into the target and starts watching its directory;
/// later calls do nothing. Bursts of change notifications are coalesced by a
/// [`BounceWindow`] before reloading. After each successful reload the
/// callback bound with [`on_load`](Session::on_load) runs.
///
/// Reload failures never propagate out of the automatic path: they are logged
/// and the target keeps its previous contents.
///
/// Each reload merges the file over the target, so fields the file omits keep
/// their values. Fields serde skips are the exception: they are reset to
/// `Default` on every successful reload (see
/// [`merge_into`](crate::sources::merge_into#skipped-fields)).
///
/// # Examples
///
/// ```rust,no_run
/// use hotload_config::prelude::*;
/// use serde::{Deserialize, Serialize};
/// use std::sync::Arc;
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct AppConfig {
///     port: u16,
/// }
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = Arc::new(RwLock::new(AppConfig::default()));
/// let session = Session::new("config.json", Arc::clone(&config));
///
/// let reader = Arc::clone(&config);
/// session.on_load(move || println!("port is now {}", reader.read().port));
/// session.ready();
/// # }
/// ```
pub struct Session<T> {
    loader: Arc<Loader<T>>,
    source: Mutex<Option<Box<dyn WatchSource>>>,
    start: Once,
    state: Mutex<WatchState>,
    active: Arc<AtomicBool>,
    last_reload_at: LastReload,
    window: BounceWindow,
    #[cfg(feature = "metrics")]
    metrics: Option<ConfigMetrics>,
}

impl<T> Session<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a session for the JSON file at `path`.
    ///
    /// Nothing is read and nothing is watched until [`ready`](Session::ready).
    /// If the platform file watcher cannot be created the error is logged and
    /// the session runs without watching; [`reload`](Session::reload) still
    /// works.
    pub fn new(path: impl Into<PathBuf>, target: SharedTarget<T>) -> Self {
        Self::from_parts(SessionParts {
            path: path.into(),
            target,
            format: Format::Json,
            window: BounceWindow::default(),
            source: default_source(),
            #[cfg(feature = "metrics")]
            metrics: None,
        })
    }

    pub(crate) fn from_parts(parts: SessionParts<T>) -> Self {
        let loader = Loader::new(parts.path, parts.format, parts.target);
        #[cfg(feature = "metrics")]
        let loader = match &parts.metrics {
            Some(metrics) => loader.with_metrics(metrics.clone()),
            None => loader,
        };

        Self {
            loader: Arc::new(loader),
            source: Mutex::new(parts.source),
            start: Once::new(),
            state: Mutex::new(WatchState::Idle),
            active: Arc::new(AtomicBool::new(false)),
            last_reload_at: Arc::new(Mutex::new(None)),
            window: parts.window,
            #[cfg(feature = "metrics")]
            metrics: parts.metrics,
        }
    }

    /// Load the file and start watching it. Idempotent.
    ///
    /// The first call spawns the initial load on its own task, so it
    /// completes asynchronously; its outcome shows up as a callback or an
    /// error log. It then subscribes to the directory containing the file.
    /// Every later call, concurrent or not, is a no-op.
    ///
    /// After [`stop_watching`](Session::stop_watching), the first `ready`
    /// performs only the initial load.
    ///
    /// Must be called from within a Tokio runtime. Outside one, the call logs
    /// an error and does nothing; a later call from inside a runtime still
    /// starts the session.
    pub fn ready(&self) {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                error!(path = %self.path().display(), error = %err, "ready() needs a Tokio runtime, session not started");
                return;
            }
        };

        self.start.call_once(|| {
            let loader = Arc::clone(&self.loader);
            runtime.spawn(async move { loader.load_reported().await });
            self.begin_watching(&runtime);
        });
    }

    /// Load the file once, right now.
    ///
    /// Serialized with automatic reloads. Runs the callback on success.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileOpen`] or [`ConfigError::Decode`]; the
    /// target is left untouched in both cases.
    pub async fn reload(&self) -> Result<()> {
        self.loader.load().await
    }

    fn begin_watching(&self, runtime: &Handle) {
        let mut state = self.state.lock();
        if !matches!(*state, WatchState::Idle) {
            return;
        }

        let Some(source) = self.source.lock().take() else {
            debug!(path = %self.path().display(), "no watch source, file changes will not be picked up");
            return;
        };

        let path = self.loader.path();
        let Some(file_name) = path.file_name() else {
            let err = ConfigError::InvalidPath(path.to_path_buf());
            error!(error = %err, "cannot watch configuration file");
            return;
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let subscription = match source.watch(dir) {
            Ok(subscription) => subscription,
            Err(err) => {
                error!(path = %path.display(), dir = %dir.display(), error = %err, "failed to watch configuration directory");
                return;
            }
        };
        let (guard, stream) = subscription.into_parts();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        self.active.store(true, Ordering::Release);
        let debouncer = Debouncer::new(
            Arc::clone(&self.loader),
            file_name.to_os_string(),
            self.window,
            Arc::clone(&self.last_reload_at),
            Arc::clone(&self.active),
        );
        #[cfg(feature = "metrics")]
        let debouncer = debouncer.with_metrics(self.metrics.clone());
        runtime.spawn(Arc::new(debouncer).run(stream, shutdown_rx));

        *state = WatchState::Active(WatchHandle {
            _guard: guard,
            _shutdown: shutdown_tx,
        });
        info!(path = %path.display(), dir = %dir.display(), "watching configuration file");
    }
}

impl<T> Session<T> {
    /// Replace the callback run after each successful reload.
    ///
    /// The previous callback is dropped. Reloads that finished before this
    /// call are not replayed. May be called before or after
    /// [`ready`](Session::ready), including from inside the current callback.
    pub fn on_load<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.loader.on_load().replace(callback);
    }

    /// Stop watching for good. Idempotent.
    ///
    /// Releases the directory subscription, ends the watch task and turns any
    /// pending re-checks into no-ops. A reload already running is not
    /// waited for.
    pub fn stop_watching(&self) {
        let previous = {
            let mut state = self.state.lock();
            self.active.store(false, Ordering::Release);
            std::mem::replace(&mut *state, WatchState::Stopped)
        };
        self.source.lock().take();

        if let WatchState::Active(handle) = previous {
            drop(handle);
            info!(path = %self.path().display(), "stopped watching configuration file");
        }
    }

    /// Path of the watched file.
    pub fn path(&self) -> &Path {
        self.loader.path()
    }

    /// Format used to parse the file.
    pub fn format(&self) -> Format {
        self.loader.format()
    }

    /// The target reloads write into.
    pub fn target(&self) -> &SharedTarget<T> {
        self.loader.target()
    }

    /// Bounce window applied to change notifications.
    pub fn window(&self) -> BounceWindow {
        self.window
    }

    /// Whether a directory watch is currently running.
    pub fn is_watching(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// When the most recent qualifying change notification arrived.
    ///
    /// `None` until the first one; the initial load does not count.
    pub fn last_reload_at(&self) -> Option<Instant> {
        *self.last_reload_at.lock()
    }
}

impl<T> Drop for Session<T> {
    fn drop(&mut self) {
        self.stop_watching();
    }
}

/// The platform watcher, or `None` (logged) if it cannot be created.
pub(crate) fn default_source() -> Option<Box<dyn WatchSource>> {
    match NotifySource::new() {
        Ok(source) => Some(Box::new(source)),
        Err(err) => {
            error!(error = %err, "file watching disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::Subscription;
    use serde::Deserialize;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct TestConfig {
        name: String,
        port: u16,
    }

    /// Records the directory it was asked to watch. The senders live in the
    /// guard, so the streams stay open but quiet until the watch is dropped.
    struct RecordingSource {
        dirs: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl WatchSource for RecordingSource {
        fn watch(self: Box<Self>, dir: &Path) -> Result<Subscription> {
            self.dirs.lock().push(dir.to_path_buf());
            let (event_tx, events) = mpsc::unbounded_channel();
            let (error_tx, errors) = mpsc::unbounded_channel();
            Ok(Subscription::new(events, errors, (event_tx, error_tx)))
        }
    }

    struct FailingSource;

    impl WatchSource for FailingSource {
        fn watch(self: Box<Self>, dir: &Path) -> Result<Subscription> {
            Err(ConfigError::WatchSubscribe {
                path: dir.to_path_buf(),
                source: notify::Error::generic("denied"),
            })
        }
    }

    fn session_with(path: PathBuf, source: Option<Box<dyn WatchSource>>) -> Session<TestConfig> {
        Session::from_parts(SessionParts {
            path,
            target: Arc::new(RwLock::new(TestConfig::default())),
            format: Format::Json,
            window: BounceWindow::default(),
            source,
            #[cfg(feature = "metrics")]
            metrics: None,
        })
    }

    fn recording(path: PathBuf) -> (Session<TestConfig>, Arc<Mutex<Vec<PathBuf>>>) {
        let dirs = Arc::new(Mutex::new(Vec::new()));
        let source = RecordingSource {
            dirs: Arc::clone(&dirs),
        };
        (session_with(path, Some(Box::new(source))), dirs)
    }

    #[tokio::test]
    async fn test_new_is_inert() {
        let (session, dirs) = recording(PathBuf::from("/nonexistent/config.json"));

        assert!(!session.is_watching());
        assert!(session.last_reload_at().is_none());
        assert!(dirs.lock().is_empty());
        assert_eq!(session.format(), Format::Json);
        assert_eq!(session.window(), BounceWindow::default());
    }

    #[tokio::test]
    async fn test_ready_watches_parent_directory_once() {
        let temp_dir = TempDir::new().unwrap();
        let (session, dirs) = recording(temp_dir.path().join("config.json"));

        session.ready();
        session.ready();
        session.ready();

        assert!(session.is_watching());
        assert_eq!(*dirs.lock(), vec![temp_dir.path().to_path_buf()]);
    }

    #[tokio::test]
    async fn test_bare_file_name_watches_current_directory() {
        let (session, dirs) = recording(PathBuf::from("config.json"));

        session.ready();

        assert_eq!(*dirs.lock(), vec![PathBuf::from(".")]);
        session.stop_watching();
    }

    #[tokio::test]
    async fn test_path_without_file_name_does_not_watch() {
        let (session, dirs) = recording(PathBuf::from("/"));

        session.ready();

        assert!(!session.is_watching());
        assert!(dirs.lock().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_failure_degrades() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        std::fs::write(&config_path, r#"{"name": "degraded", "port": 1}"#).unwrap();

        let session = session_with(config_path, Some(Box::new(FailingSource)));
        session.ready();
        assert!(!session.is_watching());

        session.reload().await.unwrap();
        assert_eq!(session.target().read().name, "degraded");
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_terminal() {
        let temp_dir = TempDir::new().unwrap();
        let (session, _dirs) = recording(temp_dir.path().join("config.json"));

        session.ready();
        session.stop_watching();
        session.stop_watching();
        assert!(!session.is_watching());

        session.ready();
        assert!(!session.is_watching());
    }

    #[tokio::test]
    async fn test_stop_before_ready_still_loads_once() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        std::fs::write(&config_path, r#"{"name": "initial", "port": 80}"#).unwrap();

        let (session, dirs) = recording(config_path);
        let (loaded_tx, mut loaded_rx) = mpsc::unbounded_channel();
        session.on_load(move || {
            let _ = loaded_tx.send(());
        });

        session.stop_watching();
        session.ready();

        loaded_rx.recv().await.unwrap();
        assert!(dirs.lock().is_empty());
        assert!(!session.is_watching());
        assert_eq!(session.target().read().name, "initial");
    }

    #[tokio::test]
    async fn test_reload_without_callback() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        std::fs::write(&config_path, r#"{"port": 7}"#).unwrap();

        let session = session_with(config_path, None);
        session.reload().await.unwrap();

        assert_eq!(session.target().read().port, 7);
    }

    #[tokio::test]
    async fn test_reload_reports_errors() {
        let temp_dir = TempDir::new().unwrap();
        let session = session_with(temp_dir.path().join("missing.json"), None);
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = Arc::clone(&calls);
        session.on_load(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let err = session.reload().await.unwrap_err();
        assert_eq!(err.reason(), "open");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drop_stops_watching() {
        let temp_dir = TempDir::new().unwrap();
        let (session, _dirs) = recording(temp_dir.path().join("config.json"));
        session.ready();

        let active = Arc::clone(&session.active);
        drop(session);

        assert!(!active.load(Ordering::Acquire));
    }

    #[test]
    fn test_ready_outside_runtime_can_be_retried() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        std::fs::write(&config_path, r#"{"name": "late", "port": 3}"#).unwrap();

        let (session, dirs) = recording(config_path);
        session.ready();
        assert!(!session.is_watching());
        assert!(dirs.lock().is_empty());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let (loaded_tx, mut loaded_rx) = mpsc::unbounded_channel();
            session.on_load(move || {
                let _ = loaded_tx.send(());
            });

            session.ready();
            loaded_rx.recv().await.unwrap();
        });

        assert!(session.is_watching());
        assert_eq!(dirs.lock().len(), 1);
        assert_eq!(session.target().read().name, "late");
        session.stop_watching();
    }
}

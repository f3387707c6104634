//! Two-stage bounce filter between raw watch events and reloads.
//!
//! Editors and filesystems tend to report a single save as several events.
//! Each qualifying event stamps `last_reload_at`. An event that lands inside
//! the bounce window of the previous one reloads immediately, on the watch
//! loop itself. Anything else (the very first event, a duplicate arriving
//! almost simultaneously, or an event after a long quiet period) is parked
//! in a deferred re-check that looks at the shared timestamp again after
//! `2 × min_gap` and reloads only if the window still holds at that point.

use crate::error::{ConfigError, Result};
use crate::watch::{EventStream, WatchEvent};
use parking_lot::Mutex;
use std::ffi::OsString;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, trace};

#[cfg(feature = "metrics")]
use crate::metrics::ConfigMetrics;

/// Something the debouncer can ask to reload.
pub(crate) trait Reload: Send + Sync + 'static {
    /// Perform one reload unless `active` is cleared by the time it may
    /// start, reporting failures itself.
    ///
    /// `active` must be checked after any waiting for other reloads, so a
    /// stop that lands while this call is queued still wins.
    fn reload(&self, active: &AtomicBool) -> impl Future<Output = ()> + Send;
}

/// Timing bounds of the bounce filter.
///
/// An event is a follow-up of the previous one when the time between them is
/// strictly inside `(min_gap, max_gap)`.
///
/// # Examples
///
/// ```rust
/// use hotload_config::core::BounceWindow;
/// use std::time::Duration;
///
/// let window = BounceWindow::new(Duration::from_millis(5), Duration::from_millis(250)).unwrap();
/// assert!(window.contains(Duration::from_millis(20)));
/// assert!(!window.contains(Duration::from_millis(5)));
/// assert_eq!(window.recheck_delay(), Duration::from_millis(10));
///
/// assert!(BounceWindow::new(Duration::from_millis(10), Duration::from_millis(10)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BounceWindow {
    min_gap: Duration,
    max_gap: Duration,
}

impl BounceWindow {
    /// Default lower bound: events closer than this are duplicates.
    pub const DEFAULT_MIN_GAP: Duration = Duration::from_millis(1);

    /// Default upper bound: events further apart than this are unrelated.
    pub const DEFAULT_MAX_GAP: Duration = Duration::from_millis(100);

    /// Create a window.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBounceWindow`] unless `min_gap < max_gap`.
    pub fn new(min_gap: Duration, max_gap: Duration) -> Result<Self> {
        if min_gap >= max_gap {
            return Err(ConfigError::InvalidBounceWindow { min_gap, max_gap });
        }
        Ok(Self { min_gap, max_gap })
    }

    /// Lower bound of the window.
    pub fn min_gap(&self) -> Duration {
        self.min_gap
    }

    /// Upper bound of the window.
    pub fn max_gap(&self) -> Duration {
        self.max_gap
    }

    /// Whether `elapsed` falls strictly inside the window.
    pub fn contains(&self, elapsed: Duration) -> bool {
        self.min_gap < elapsed && elapsed < self.max_gap
    }

    /// How long a deferred re-check waits before looking again.
    pub fn recheck_delay(&self) -> Duration {
        self.min_gap * 2
    }
}

impl Default for BounceWindow {
    fn default() -> Self {
        Self {
            min_gap: Self::DEFAULT_MIN_GAP,
            max_gap: Self::DEFAULT_MAX_GAP,
        }
    }
}

/// Time of the most recent qualifying notification, shared with the session.
pub(crate) type LastReload = Arc<Mutex<Option<Instant>>>;

/// Filters and coalesces watch events for one file.
pub(crate) struct Debouncer<R> {
    reloader: Arc<R>,
    file_name: OsString,
    window: BounceWindow,
    last_reload_at: LastReload,
    active: Arc<AtomicBool>,
    #[cfg(feature = "metrics")]
    metrics: Option<ConfigMetrics>,
}

impl<R: Reload> Debouncer<R> {
    pub(crate) fn new(
        reloader: Arc<R>,
        file_name: OsString,
        window: BounceWindow,
        last_reload_at: LastReload,
        active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            reloader,
            file_name,
            window,
            last_reload_at,
            active,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn with_metrics(mut self, metrics: Option<ConfigMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Consume a subscription until it closes or `shutdown` fires.
    ///
    /// Watcher errors are logged and do not end the loop.
    pub(crate) async fn run(self: Arc<Self>, stream: EventStream, mut shutdown: oneshot::Receiver<()>) {
        let EventStream {
            mut events,
            mut errors,
        } = stream;
        let mut errors_open = true;

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,
                event = events.recv() => match event {
                    Some(event) => self.handle(&event).await,
                    None => break,
                },
                err = errors.recv(), if errors_open => match err {
                    Some(err) => {
                        let err = ConfigError::WatchStream(err);
                        error!(file = ?self.file_name, error = %err, "file watcher reported an error");
                    }
                    None => errors_open = false,
                },
            }
        }

        debug!(file = ?self.file_name, "watch loop finished");
    }

    /// Whether `event` concerns the watched file and may trigger a reload.
    pub(crate) fn is_relevant(&self, event: &WatchEvent) -> bool {
        !event.is_delete() && event.file_name() == Some(self.file_name.as_os_str())
    }

    /// Apply the bounce filter to one raw event.
    pub(crate) async fn handle(self: &Arc<Self>, event: &WatchEvent) {
        if !self.is_relevant(event) {
            debug!(path = %event.path.display(), kind = ?event.kind, "ignoring watch event");
            return;
        }

        let elapsed = self.stamp();
        let follow_up = elapsed.is_some_and(|elapsed| self.window.contains(elapsed));

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_event(!follow_up);
        }

        if follow_up {
            // Runs on the watch loop; later events queue behind it
            if self.active.load(Ordering::Acquire) {
                self.reloader.reload(&self.active).await;
            }
        } else {
            debug!(path = %event.path.display(), ?elapsed, "deferring reload decision");
            let this = Arc::clone(self);
            tokio::spawn(async move { this.recheck().await });
        }
    }

    /// Record "now" as the latest event and return the gap since the previous one.
    fn stamp(&self) -> Option<Duration> {
        let now = Instant::now();
        let mut last = self.last_reload_at.lock();
        let elapsed = last.map(|previous| now.saturating_duration_since(previous));
        *last = Some(now);
        elapsed
    }

    async fn recheck(&self) {
        sleep(self.window.recheck_delay()).await;

        if !self.active.load(Ordering::Acquire) {
            trace!("re-check after stop, skipping");
            return;
        }

        let waited = self.last_reload_at.lock().map(|at| at.elapsed());
        if waited.is_some_and(|waited| self.window.contains(waited)) {
            self.reloader.reload(&self.active).await;
        } else {
            trace!(?waited, "re-check superseded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::ChangeKind;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct CountingReloader {
        calls: AtomicUsize,
    }

    impl CountingReloader {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Reload for CountingReloader {
        async fn reload(&self, active: &AtomicBool) {
            if active.load(Ordering::Acquire) {
                self.calls.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn window() -> BounceWindow {
        BounceWindow::new(Duration::from_millis(10), Duration::from_millis(100)).unwrap()
    }

    fn debouncer() -> (Arc<Debouncer<CountingReloader>>, Arc<CountingReloader>) {
        let reloader = Arc::new(CountingReloader::default());
        let debouncer = Debouncer::new(
            Arc::clone(&reloader),
            OsString::from("config.json"),
            window(),
            Arc::new(Mutex::new(None)),
            Arc::new(AtomicBool::new(true)),
        );
        (Arc::new(debouncer), reloader)
    }

    fn write(name: &str) -> WatchEvent {
        WatchEvent::new(format!("/etc/app/{name}"), ChangeKind::Write)
    }

    async fn settle(ms: u64) {
        sleep(Duration::from_millis(ms)).await;
    }

    #[test]
    fn test_default_window() {
        let window = BounceWindow::default();
        assert_eq!(window.min_gap(), Duration::from_millis(1));
        assert_eq!(window.max_gap(), Duration::from_millis(100));
        assert_eq!(window.recheck_delay(), Duration::from_millis(2));
    }

    #[test]
    fn test_window_bounds_are_exclusive() {
        let window = window();
        assert!(!window.contains(Duration::from_millis(10)));
        assert!(window.contains(Duration::from_millis(11)));
        assert!(window.contains(Duration::from_millis(99)));
        assert!(!window.contains(Duration::from_millis(100)));
    }

    #[test]
    fn test_invalid_window() {
        let err = BounceWindow::new(Duration::from_millis(50), Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBounceWindow { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lone_event_reloads_after_recheck() {
        let (debouncer, reloader) = debouncer();

        debouncer.handle(&write("config.json")).await;
        assert_eq!(reloader.calls(), 0);

        settle(15).await;
        assert_eq!(reloader.calls(), 0);

        settle(10).await;
        assert_eq!(reloader.calls(), 1);

        settle(500).await;
        assert_eq!(reloader.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_up_reloads_inline_and_supersedes_recheck() {
        let (debouncer, reloader) = debouncer();

        debouncer.handle(&write("config.json")).await;
        settle(15).await;

        // 15ms after the first event: inside (10ms, 100ms)
        debouncer.handle(&write("config.json")).await;
        assert_eq!(reloader.calls(), 1);

        // The first event's re-check sees only 5ms since the follow-up
        settle(500).await;
        assert_eq!(reloader.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simultaneous_duplicates_are_deferred() {
        let (debouncer, reloader) = debouncer();

        debouncer.handle(&write("config.json")).await;
        debouncer.handle(&write("config.json")).await;
        assert_eq!(reloader.calls(), 0);

        // Both re-checks fire at the same instant, 20ms after the last stamp
        settle(500).await;
        assert_eq!(reloader.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_after_quiet_period_is_deferred() {
        let (debouncer, reloader) = debouncer();

        debouncer.handle(&write("config.json")).await;
        settle(500).await;
        assert_eq!(reloader.calls(), 1);

        debouncer.handle(&write("config.json")).await;
        assert_eq!(reloader.calls(), 1);

        settle(25).await;
        assert_eq!(reloader.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_keeps_pushing_recheck_out() {
        let (debouncer, reloader) = debouncer();

        // First event deferred, then three follow-ups 15ms apart
        debouncer.handle(&write("config.json")).await;
        for _ in 0..3 {
            settle(15).await;
            debouncer.handle(&write("config.json")).await;
        }
        assert_eq!(reloader.calls(), 3);

        settle(500).await;
        assert_eq!(reloader.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletes_and_other_files_are_ignored() {
        let (debouncer, reloader) = debouncer();

        debouncer
            .handle(&WatchEvent::new("/etc/app/config.json", ChangeKind::Remove))
            .await;
        debouncer.handle(&write("other.json")).await;
        debouncer.handle(&write("config.json.swp")).await;

        assert!(debouncer.last_reload_at.lock().is_none());
        settle(500).await;
        assert_eq!(reloader.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recheck_after_stop_is_noop() {
        let (debouncer, reloader) = debouncer();

        debouncer.handle(&write("config.json")).await;
        debouncer.active.store(false, Ordering::Release);

        settle(500).await;
        assert_eq!(reloader.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_up_after_stop_is_noop() {
        let (debouncer, reloader) = debouncer();

        debouncer.handle(&write("config.json")).await;
        settle(15).await;
        debouncer.active.store(false, Ordering::Release);
        debouncer.handle(&write("config.json")).await;

        settle(500).await;
        assert_eq!(reloader.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_errors_and_ends_with_stream() {
        let (debouncer, reloader) = debouncer();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(Arc::clone(&debouncer).run(EventStream { events, errors }, shutdown_rx));

        error_tx.send(notify::Error::generic("boom")).unwrap();
        settle(5).await;
        event_tx.send(write("config.json")).unwrap();
        settle(500).await;
        assert_eq!(reloader.calls(), 1);
        assert!(!task.is_finished());

        drop(error_tx);
        drop(event_tx);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let (debouncer, reloader) = debouncer();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (_error_tx, errors) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(Arc::clone(&debouncer).run(EventStream { events, errors }, shutdown_rx));

        drop(shutdown_tx);
        task.await.unwrap();

        // Nobody is listening anymore
        assert!(event_tx.send(write("config.json")).is_err());
        settle(500).await;
        assert_eq!(reloader.calls(), 0);
    }
}

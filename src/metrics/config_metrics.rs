//! Reload and notification metrics using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::sync::Arc;
use std::time::Instant;

/// Metrics collector for a watched configuration file.
///
/// Tracks reload attempts and their outcome, reload latency, how many watch
/// notifications arrived and how many were deferred by the bounce filter.
///
/// # Examples
///
/// ```rust,no_run
/// use hotload_config::metrics::ConfigMetrics;
/// use opentelemetry::global;
///
/// let meter = global::meter("hotload-config");
/// let metrics = ConfigMetrics::new(meter);
///
/// let timer = metrics.start_reload();
/// // ... perform reload ...
/// metrics.record_reload_success(timer);
/// ```
#[derive(Clone)]
pub struct ConfigMetrics {
    reload_attempts: Counter<u64>,
    reload_success: Counter<u64>,
    reload_failures: Counter<u64>,
    reload_duration: Histogram<f64>,
    events_received: Counter<u64>,
    events_deferred: Counter<u64>,
    config_age_seconds: Gauge<i64>,
    last_success: Arc<parking_lot::Mutex<Instant>>,
}

impl ConfigMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let reload_attempts = meter
            .u64_counter("hotload_config.reload.attempts")
            .with_description("Total number of reload attempts")
            .build();

        let reload_success = meter
            .u64_counter("hotload_config.reload.success")
            .with_description("Number of successful reloads")
            .build();

        let reload_failures = meter
            .u64_counter("hotload_config.reload.failures")
            .with_description("Number of failed reloads, by reason")
            .build();

        let reload_duration = meter
            .f64_histogram("hotload_config.reload.duration")
            .with_description("Duration of read + decode + callback in seconds")
            .with_unit("s")
            .build();

        let events_received = meter
            .u64_counter("hotload_config.events.received")
            .with_description("Watch notifications for the configuration file")
            .build();

        let events_deferred = meter
            .u64_counter("hotload_config.events.deferred")
            .with_description("Notifications handed to a deferred re-check")
            .build();

        let config_age_seconds = meter
            .i64_gauge("hotload_config.age")
            .with_description("Time since the last successful reload in seconds")
            .with_unit("s")
            .build();

        Self {
            reload_attempts,
            reload_success,
            reload_failures,
            reload_duration,
            events_received,
            events_deferred,
            config_age_seconds,
            last_success: Arc::new(parking_lot::Mutex::new(Instant::now())),
        }
    }

    /// Start a reload timer and count the attempt.
    pub fn start_reload(&self) -> Instant {
        self.reload_attempts.add(1, &[]);
        Instant::now()
    }

    /// Record a successful reload started at `start`.
    pub fn record_reload_success(&self, start: Instant) {
        self.reload_success.add(1, &[]);
        self.reload_duration
            .record(start.elapsed().as_secs_f64(), &[]);

        *self.last_success.lock() = Instant::now();
    }

    /// Record a failed reload started at `start`.
    ///
    /// `reason` is a short label such as `"open"` or `"decode"`.
    pub fn record_reload_failure(&self, start: Instant, reason: &'static str) {
        self.reload_failures
            .add(1, &[KeyValue::new("reason", reason)]);
        self.reload_duration
            .record(start.elapsed().as_secs_f64(), &[]);
    }

    /// Record a notification for the watched file.
    pub fn record_event(&self, deferred: bool) {
        self.events_received.add(1, &[]);
        if deferred {
            self.events_deferred.add(1, &[]);
        }
    }

    /// Publish the time since the last successful reload.
    ///
    /// Call this periodically to track how stale the configuration is.
    pub fn update_config_age(&self) {
        let age_secs = self.last_success.lock().elapsed().as_secs() as i64;
        self.config_age_seconds.record(age_secs, &[]);
    }
}

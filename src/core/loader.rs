//! Reads the configuration file and merges it into the shared target.

use crate::core::SharedTarget;
use crate::core::callback::CallbackSlot;
use crate::core::debounce::Reload;
use crate::error::{ConfigError, Result};
use crate::sources::{Format, merge_into};
use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[cfg(feature = "metrics")]
use crate::metrics::ConfigMetrics;

/// Loads one configuration file into a caller-owned value.
///
/// Every load goes through `gate`, so at most one read/decode/callback
/// sequence runs at a time no matter who asked for it: the initial load,
/// the watch loop, a deferred re-check or a manual reload.
pub(crate) struct Loader<T> {
    path: PathBuf,
    format: Format,
    target: SharedTarget<T>,
    on_load: CallbackSlot,
    gate: Mutex<()>,
    #[cfg(feature = "metrics")]
    metrics: Option<ConfigMetrics>,
}

impl<T> Loader<T> {
    pub(crate) fn new(path: PathBuf, format: Format, target: SharedTarget<T>) -> Self {
        Self {
            path,
            format,
            target,
            on_load: CallbackSlot::new(),
            gate: Mutex::new(()),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn with_metrics(mut self, metrics: ConfigMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn format(&self) -> Format {
        self.format
    }

    pub(crate) fn target(&self) -> &SharedTarget<T> {
        &self.target
    }

    pub(crate) fn on_load(&self) -> &CallbackSlot {
        &self.on_load
    }

    fn decode_error(&self, message: impl ToString) -> ConfigError {
        ConfigError::Decode {
            path: self.path.clone(),
            format: self.format.name(),
            message: message.to_string(),
        }
    }
}

impl<T> Loader<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Read, decode and merge the file, then run the callback.
    ///
    /// On any error the target keeps its previous contents and the callback
    /// is not invoked.
    pub(crate) async fn load(&self) -> Result<()> {
        let _serial = self.gate.lock().await;
        self.load_serialized().await
    }

    /// [`load`](Self::load), logging the failure instead of returning it.
    pub(crate) async fn load_reported(&self) {
        let outcome = self.load().await;
        self.report(outcome);
    }

    /// Body of a load; the caller holds `gate`.
    async fn load_serialized(&self) -> Result<()> {
        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(|m| m.start_reload());

        let outcome = self.read_and_merge().await;

        #[cfg(feature = "metrics")]
        if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
            match &outcome {
                Ok(()) => metrics.record_reload_success(timer),
                Err(err) => metrics.record_reload_failure(timer, err.reason()),
            }
        }

        if outcome.is_ok() {
            self.on_load.invoke();
        }
        outcome
    }

    fn report(&self, outcome: Result<()>) {
        if let Err(err) = outcome {
            tracing::error!(
                path = %self.path.display(),
                reason = err.reason(),
                error = %err,
                "configuration reload failed, keeping previous values"
            );
        }
    }

    async fn read_and_merge(&self) -> Result<()> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| ConfigError::FileOpen {
                path: self.path.clone(),
                source,
            })?;

        let document = self
            .format
            .parse(&bytes)
            .map_err(|message| self.decode_error(message))?;

        let mut target = self.target.write();
        merge_into(&mut *target, document).map_err(|err| self.decode_error(err))
    }
}

impl<T> Reload for Loader<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn reload(&self, active: &AtomicBool) {
        let _serial = self.gate.lock().await;
        if !active.load(Ordering::Acquire) {
            tracing::trace!(path = %self.path.display(), "watch stopped while waiting, skipping reload");
            return;
        }
        let outcome = self.load_serialized().await;
        self.report(outcome);
    }
}

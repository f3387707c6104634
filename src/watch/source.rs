//! Watch source trait and the event types it produces.

use crate::error::Result;
use std::any::Any;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// What happened to a file in the watched directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The file was created.
    Create,
    /// The file's contents or metadata were written.
    Write,
    /// The file was renamed to or from this name.
    Rename,
    /// The file was removed.
    Remove,
}

/// A single change notification for a file in the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Path of the file that changed.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: ChangeKind,
}

impl WatchEvent {
    /// Create a new event.
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Whether this event reports a removal.
    pub fn is_delete(&self) -> bool {
        self.kind == ChangeKind::Remove
    }

    /// Final component of the changed path.
    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }
}

/// The two streams a subscription delivers.
pub(crate) struct EventStream {
    pub(crate) events: mpsc::UnboundedReceiver<WatchEvent>,
    pub(crate) errors: mpsc::UnboundedReceiver<notify::Error>,
}

/// An active directory subscription.
///
/// Holds the event and error streams plus a guard that keeps the underlying
/// watch alive. Dropping the guard releases the subscription.
pub struct Subscription {
    stream: EventStream,
    guard: Box<dyn Any + Send>,
}

impl Subscription {
    /// Bundle the streams of a watch with the value that keeps it alive.
    ///
    /// `guard` is dropped when the owning session stops watching; for a
    /// `notify` watcher that unregisters the OS watch and closes both streams.
    pub fn new(
        events: mpsc::UnboundedReceiver<WatchEvent>,
        errors: mpsc::UnboundedReceiver<notify::Error>,
        guard: impl Any + Send,
    ) -> Self {
        Self {
            stream: EventStream { events, errors },
            guard: Box::new(guard),
        }
    }

    pub(crate) fn into_parts(self) -> (Box<dyn Any + Send>, EventStream) {
        (self.guard, self.stream)
    }
}

/// Source of change notifications for a directory.
///
/// Implement this to feed a session from something other than the platform
/// file watcher, such as a test harness or a remote change feed.
///
/// A source is consumed by its first successful or failed subscription; a
/// session subscribes at most once.
pub trait WatchSource: Send + 'static {
    /// Start watching `dir` (non-recursively).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WatchSubscribe`](crate::error::ConfigError::WatchSubscribe)
    /// if the directory cannot be watched.
    fn watch(self: Box<Self>, dir: &Path) -> Result<Subscription>;
}

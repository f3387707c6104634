//! Platform file watching backed by the `notify` crate.

use super::source::{ChangeKind, Subscription, WatchEvent, WatchSource};
use crate::error::{ConfigError, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::Path;
use tokio::sync::mpsc;

/// Watch source that uses the platform's recommended file watcher.
///
/// The OS watcher is created eagerly by [`NotifySource::new`] so that a
/// platform failure surfaces at construction time; the directory itself is
/// only registered when a session subscribes.
///
/// # Examples
///
/// ```rust,no_run
/// use hotload_config::watch::{NotifySource, WatchSource};
/// use std::path::Path;
///
/// # fn example() -> hotload_config::error::Result<()> {
/// let source = Box::new(NotifySource::new()?);
/// let _subscription = source.watch(Path::new("/etc/my-app"))?;
/// # Ok(())
/// # }
/// ```
pub struct NotifySource {
    watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<WatchEvent>,
    errors: mpsc::UnboundedReceiver<notify::Error>,
}

impl NotifySource {
    /// Create the platform watcher.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WatchInit`] if the watcher cannot be created
    /// (for example when the inotify instance limit is exhausted).
    pub fn new() -> Result<Self> {
        let (event_tx, events) = mpsc::unbounded_channel::<WatchEvent>();
        let (error_tx, errors) = mpsc::unbounded_channel::<notify::Error>();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in translate(&event) {
                    // Receiver gone means the session stopped; nothing left to do
                    let _ = event_tx.send(change);
                }
            }
            Err(err) => {
                let _ = error_tx.send(err);
            }
        })
        .map_err(ConfigError::WatchInit)?;

        Ok(Self {
            watcher,
            events,
            errors,
        })
    }
}

impl WatchSource for NotifySource {
    fn watch(self: Box<Self>, dir: &Path) -> Result<Subscription> {
        let Self {
            mut watcher,
            events,
            errors,
        } = *self;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| ConfigError::WatchSubscribe {
                path: dir.to_path_buf(),
                source,
            })?;

        Ok(Subscription::new(events, errors, watcher))
    }
}

/// Map a raw `notify` event to one change per affected path.
///
/// Access events carry no content change and are dropped. Paired renames
/// (`RenameMode::Both`) are dropped as well because the backends that emit
/// them also emit the separate `From` and `To` halves.
pub(crate) fn translate(event: &Event) -> Vec<WatchEvent> {
    let Some(kind) = change_kind(&event.kind) else {
        return Vec::new();
    };

    event
        .paths
        .iter()
        .map(|path| WatchEvent::new(path.clone(), kind))
        .collect()
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => None,
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Rename),
        EventKind::Modify(_) => Some(ChangeKind::Write),
        EventKind::Remove(_) => Some(ChangeKind::Remove),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

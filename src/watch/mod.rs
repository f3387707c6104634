//! Directory watching.
//!
//! A [`WatchSource`] turns a directory into a stream of [`WatchEvent`]s plus a
//! stream of watcher errors. [`NotifySource`] is the default implementation.

mod source;
mod watcher;

pub use source::{ChangeKind, Subscription, WatchEvent, WatchSource};
pub use watcher::NotifySource;

pub(crate) use source::EventStream;

//! Error types for hotload-config.

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for hotload-config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while watching and reloading a configuration file.
///
/// None of these are fatal. Automatic reloads log them and keep serving the
/// last good configuration; [`Session::reload`](crate::core::Session::reload)
/// and [`SessionBuilder::build`](crate::core::SessionBuilder::build) return
/// them to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The platform file watcher could not be created.
    #[error("Failed to initialize file watcher: {0}")]
    WatchInit(#[source] notify::Error),

    /// The directory containing the configuration file could not be watched.
    #[error("Failed to watch directory {}: {source}", path.display())]
    WatchSubscribe {
        /// The directory that was passed to the watch source
        path: PathBuf,
        /// The underlying watcher error
        #[source]
        source: notify::Error,
    },

    /// The watch source reported an error while running.
    #[error("File watcher error: {0}")]
    WatchStream(#[source] notify::Error),

    /// The configuration file could not be opened or read.
    #[error("Failed to open {}: {source}", path.display())]
    FileOpen {
        /// The configuration file path
        path: PathBuf,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The configuration document is malformed or does not fit the target type.
    #[error("Failed to decode {} as {format}: {message}", path.display())]
    Decode {
        /// The configuration file path
        path: PathBuf,
        /// Name of the format used to parse the document
        format: &'static str,
        /// Parser or deserializer message
        message: String,
    },

    /// The configuration path has no file name component to filter on.
    #[error("Configuration path has no file name: {}", .0.display())]
    InvalidPath(PathBuf),

    /// A bounce window whose lower bound is not below its upper bound.
    #[error("Invalid bounce window: min gap {min_gap:?} must be less than max gap {max_gap:?}")]
    InvalidBounceWindow {
        /// Requested lower bound
        min_gap: Duration,
        /// Requested upper bound
        max_gap: Duration,
    },

    /// Attempted to use a feature that is not enabled.
    #[error("Feature not enabled: {0}")]
    FeatureNotEnabled(&'static str),
}

impl ConfigError {
    /// Short label for the failure class, used for log fields and metric attributes.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::WatchInit(_) => "watch_init",
            Self::WatchSubscribe { .. } => "watch_subscribe",
            Self::WatchStream(_) => "watch_stream",
            Self::FileOpen { .. } => "open",
            Self::Decode { .. } => "decode",
            Self::InvalidPath(_) => "invalid_path",
            Self::InvalidBounceWindow { .. } => "invalid_window",
            Self::FeatureNotEnabled(_) => "feature",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = ConfigError::Decode {
            path: PathBuf::from("config.json"),
            format: "json",
            message: "expected value at line 1 column 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to decode config.json as json: expected value at line 1 column 1"
        );
        assert_eq!(err.reason(), "decode");
    }

    #[test]
    fn test_file_open_error_keeps_source() {
        let err = ConfigError::FileOpen {
            path: PathBuf::from("/missing/config.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.reason(), "open");
    }
}

//! Document formats understood by the loader.

use crate::error::Result;
use serde_json::Value;
use std::path::Path;

/// Structured-data format used to parse the watched file.
///
/// Every format is parsed into a [`serde_json::Value`] tree first, so the
/// merge step is identical regardless of the on-disk syntax.
///
/// # Examples
///
/// ```rust
/// use hotload_config::sources::Format;
///
/// assert_eq!(Format::from_path("settings.json").unwrap(), Format::Json);
/// assert_eq!(Format::from_path("settings").unwrap(), Format::Json);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Format {
    /// JSON, the reference format.
    #[default]
    Json,
    /// YAML (requires the `yaml` feature).
    #[cfg(feature = "yaml")]
    Yaml,
    /// TOML (requires the `toml` feature).
    #[cfg(feature = "toml")]
    Toml,
}

impl Format {
    /// Detect the format from a file extension.
    ///
    /// - `.yaml`, `.yml` -> YAML
    /// - `.toml` -> TOML
    /// - anything else, or no extension -> JSON
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FeatureNotEnabled`](crate::error::ConfigError::FeatureNotEnabled) when the extension names a
    /// format whose cargo feature is disabled.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("yaml") | Some("yml") => Self::yaml(),
            Some("toml") => Self::toml(),
            _ => Ok(Self::Json),
        }
    }

    #[cfg(feature = "yaml")]
    fn yaml() -> Result<Self> {
        Ok(Self::Yaml)
    }

    #[cfg(not(feature = "yaml"))]
    fn yaml() -> Result<Self> {
        Err(crate::error::ConfigError::FeatureNotEnabled("yaml"))
    }

    #[cfg(feature = "toml")]
    fn toml() -> Result<Self> {
        Ok(Self::Toml)
    }

    #[cfg(not(feature = "toml"))]
    fn toml() -> Result<Self> {
        Err(crate::error::ConfigError::FeatureNotEnabled("toml"))
    }

    /// Human-readable name of the format.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Json => "json",
            #[cfg(feature = "yaml")]
            Self::Yaml => "yaml",
            #[cfg(feature = "toml")]
            Self::Toml => "toml",
        }
    }

    /// Parse raw file contents into a document tree.
    ///
    /// JSON files are read up to the end of the first value; anything after
    /// it is ignored.
    ///
    /// The returned error is the parser's message; the caller attaches the path.
    pub fn parse(&self, bytes: &[u8]) -> std::result::Result<Value, String> {
        match self {
            Self::Json => parse_first_json(bytes),
            #[cfg(feature = "yaml")]
            Self::Yaml => serde_yaml::from_slice(bytes).map_err(|e| e.to_string()),
            #[cfg(feature = "toml")]
            Self::Toml => {
                let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
                toml::from_str(text).map_err(|e| e.to_string())
            }
        }
    }
}

/// Decode the first JSON value and ignore whatever follows it.
fn parse_first_json(bytes: &[u8]) -> std::result::Result<Value, String> {
    match serde_json::Deserializer::from_slice(bytes).into_iter::<Value>().next() {
        Some(value) => value.map_err(|e| e.to_string()),
        None => Err("empty document".to_string()),
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

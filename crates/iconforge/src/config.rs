//! Configuration loading: one JSON document with an `editor` and an
//! `export` section, from a file or inline.

use std::path::{Path, PathBuf};

use iconforge_export::ExportConfig;
use iconforge_pipeline::EditorConfig;
use serde::{Deserialize, Serialize};

/// Everything the CLI can configure.
///
/// Missing sections and fields take their defaults, so `{}` is a valid
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Document, pipeline and decode settings.
    pub editor: EditorConfig,
    /// Encoder, bundle and worker settings.
    pub export: ExportConfig,
}

/// A configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        /// The file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The JSON is malformed or mistyped.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The values parse but cannot be used.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Parse a (possibly partial) JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] for unusable values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `inline` JSON if given, else from `file`, else defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the chosen source cannot be read,
    /// parsed or validated.
    pub fn load(file: Option<&Path>, inline: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(json) = inline {
            if file.is_some() {
                tracing::warn!("--config-json given, ignoring --config");
            }
            return Self::from_json(json);
        }
        let Some(path) = file else {
            return Ok(Self::default());
        };
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.editor.scale_bounds.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "scale bounds {}..={} must satisfy 0 < min <= max <= 1",
                self.editor.scale_bounds.min, self.editor.scale_bounds.max
            )));
        }
        self.export
            .check_bundle_sizes(&self.export.default_sizes)
            .map_err(|e| ConfigError::Invalid(format!("default_sizes: {e}")))?;
        self.export
            .check_bundle_sizes(&self.export.standard_sizes)
            .map_err(|e| ConfigError::Invalid(format!("standard_sizes: {e}")))?;
        if !(1..=100).contains(&self.export.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality {} outside 1..=100",
                self.export.jpeg_quality
            )));
        }
        Ok(())
    }
}

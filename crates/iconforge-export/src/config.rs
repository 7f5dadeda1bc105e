//! Export configuration: per-format quality, bundle sizes, timeout and
//! resource limits.

use std::time::Duration;

use iconforge_pipeline::ValidationError;
use serde::{Deserialize, Serialize};

/// Settings consumed by the export layer.
///
/// Every field has a `DEFAULT_*` constant so front ends can reference
/// the defaults without constructing a config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// JPEG quality (1-100).
    pub jpeg_quality: u8,

    /// WebP quality (1-100).
    ///
    /// The WebP encoder is lossless, so this is recorded but does not
    /// change the output.
    pub webp_quality: u8,

    /// Sizes offered for icon bundles.
    pub standard_sizes: Vec<u32>,

    /// Sizes used when a bundle request names none.
    pub default_sizes: Vec<u32>,

    /// Sizes always generated for a bundle but never emitted.
    pub hidden_sizes: Vec<u32>,

    /// Largest accepted bundle entry side length.
    pub max_bundle_size: u32,

    /// Budget for a whole export operation.
    #[serde(with = "iconforge_pipeline::config::duration_serde")]
    pub timeout: Duration,

    /// Longest side after a compress task.
    pub max_width_or_height: u32,

    /// Number of encode buffers kept for reuse.
    pub scratch_pool_size: usize,
}

impl ExportConfig {
    /// Default JPEG quality.
    pub const DEFAULT_JPEG_QUALITY: u8 = 90;
    /// Default WebP quality.
    pub const DEFAULT_WEBP_QUALITY: u8 = 85;
    /// Default offered bundle sizes.
    pub const DEFAULT_STANDARD_SIZES: [u32; 6] = [16, 32, 48, 64, 128, 256];
    /// Default bundle sizes when none are requested.
    pub const DEFAULT_BUNDLE_SIZES: [u32; 5] = [16, 32, 48, 64, 128];
    /// Default hidden base sizes.
    pub const DEFAULT_HIDDEN_SIZES: [u32; 1] = [8];
    /// Default (and largest possible) ICO entry size.
    pub const DEFAULT_MAX_BUNDLE_SIZE: u32 = 256;
    /// Default export timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default compress bound.
    pub const DEFAULT_MAX_WIDTH_OR_HEIGHT: u32 = 1920;
    /// Default scratch pool size.
    pub const DEFAULT_SCRATCH_POOL_SIZE: usize = 3;

    /// Parse a (possibly partial) JSON document.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed input.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reject bundle sizes outside `1..=max_bundle_size`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidParameter`] naming the first
    /// offending size.
    pub fn check_bundle_sizes(&self, sizes: &[u32]) -> Result<(), ValidationError> {
        match sizes
            .iter()
            .find(|&&size| !(1..=self.max_bundle_size).contains(&size))
        {
            Some(size) => Err(ValidationError::InvalidParameter(format!(
                "icon size {size} outside 1..={}",
                self.max_bundle_size
            ))),
            None => Ok(()),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: Self::DEFAULT_JPEG_QUALITY,
            webp_quality: Self::DEFAULT_WEBP_QUALITY,
            standard_sizes: Self::DEFAULT_STANDARD_SIZES.to_vec(),
            default_sizes: Self::DEFAULT_BUNDLE_SIZES.to_vec(),
            hidden_sizes: Self::DEFAULT_HIDDEN_SIZES.to_vec(),
            max_bundle_size: Self::DEFAULT_MAX_BUNDLE_SIZE,
            timeout: Self::DEFAULT_TIMEOUT,
            max_width_or_height: Self::DEFAULT_MAX_WIDTH_OR_HEIGHT,
            scratch_pool_size: Self::DEFAULT_SCRATCH_POOL_SIZE,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ExportConfig::from_json(r#"{"jpeg_quality": 70, "timeout": 2.5}"#).unwrap();
        assert_eq!(config.jpeg_quality, 70);
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.hidden_sizes, [8]);
        assert_eq!(config.scratch_pool_size, 3);
    }

    #[test]
    fn timeout_serializes_as_seconds() {
        let json = serde_json::to_value(ExportConfig::default()).unwrap();
        assert_eq!(json["timeout"], 30.0);
    }

    #[test]
    fn negative_timeout_rejected() {
        assert!(ExportConfig::from_json(r#"{"timeout": -1}"#).is_err());
    }

    #[test]
    fn bundle_size_range() {
        let config = ExportConfig::default();
        assert!(config.check_bundle_sizes(&[1, 16, 256]).is_ok());
        assert!(config.check_bundle_sizes(&[0]).is_err());
        assert!(config.check_bundle_sizes(&[16, 257]).is_err());
    }
}

//! Editor configuration: scale bounds, change detection and input limits.
//!
//! All structs are plain serde values with `#[serde(default)]`, so a
//! partial JSON document only overrides the fields it names.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Serde helper that stores a `Duration` as fractional seconds.
pub mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    ///
    /// # Errors
    ///
    /// Fails for negative, non-finite or unrepresentable values.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Lower and upper bound for the resolution scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleBounds {
    /// Smallest accepted factor.
    pub min: f64,
    /// Largest accepted factor.
    pub max: f64,
}

impl ScaleBounds {
    /// Default lower bound.
    pub const DEFAULT_MIN: f64 = 0.1;
    /// Default upper bound.
    pub const DEFAULT_MAX: f64 = 1.0;

    /// Whether the bounds describe a usable, non-empty range inside
    /// `(0, 1]`.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.min > 0.0
            && self.min <= self.max
            && self.max <= 1.0
    }

    /// Clamp `factor` into the range. Non-finite input maps to `max`.
    #[must_use]
    pub fn clamp(self, factor: f64) -> f64 {
        if factor.is_nan() {
            return self.max;
        }
        factor.clamp(self.min, self.max)
    }
}

impl Default for ScaleBounds {
    fn default() -> Self {
        Self {
            min: Self::DEFAULT_MIN,
            max: Self::DEFAULT_MAX,
        }
    }
}

/// Tuning for the debounced change detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeDetectionConfig {
    /// Quiet period before a burst of change checks is evaluated.
    #[serde(with = "duration_serde")]
    pub debounce: Duration,

    /// Largest per-channel difference still considered equal.
    pub pixel_tolerance: u8,

    /// Largest per-axis size difference still considered equal.
    pub dimension_tolerance: u32,

    /// Whether to compare a sparse sample of pixels after dimensions and
    /// filter state agree.
    pub pixel_sampling: bool,
}

impl ChangeDetectionConfig {
    /// Default debounce window.
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);
    /// Default per-channel tolerance.
    pub const DEFAULT_PIXEL_TOLERANCE: u8 = 0;
    /// Default per-axis tolerance.
    pub const DEFAULT_DIMENSION_TOLERANCE: u32 = 0;
}

impl Default for ChangeDetectionConfig {
    fn default() -> Self {
        Self {
            debounce: Self::DEFAULT_DEBOUNCE,
            pixel_tolerance: Self::DEFAULT_PIXEL_TOLERANCE,
            dimension_tolerance: Self::DEFAULT_DIMENSION_TOLERANCE,
            pixel_sampling: true,
        }
    }
}

/// Configuration for documents, their pipelines and the decode
/// boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Range the resolution filter clamps its factor into.
    pub scale_bounds: ScaleBounds,

    /// Change detector tuning shared by every new document.
    pub change_detection: ChangeDetectionConfig,

    /// Largest accepted decoded side length in pixels.
    pub max_dimension: u32,

    /// Largest accepted encoded input in bytes.
    pub max_input_bytes: usize,
}

impl EditorConfig {
    /// Default maximum side length.
    pub const DEFAULT_MAX_DIMENSION: u32 = 4096;
    /// Default maximum input size (10 MiB).
    pub const DEFAULT_MAX_INPUT_BYTES: usize = 10 * 1024 * 1024;

    /// Parse a (possibly partial) JSON document.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed JSON or mistyped
    /// fields.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            scale_bounds: ScaleBounds::default(),
            change_detection: ChangeDetectionConfig::default(),
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
            max_input_bytes: Self::DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.change_detection.debounce, Duration::from_millis(100));
        assert_eq!(config.change_detection.pixel_tolerance, 0);
        assert_eq!(config.change_detection.dimension_tolerance, 0);
        assert!(config.change_detection.pixel_sampling);
        assert_eq!(config.max_dimension, 4096);
        assert_eq!(config.max_input_bytes, 10_485_760);
        assert!(config.scale_bounds.is_valid());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config =
            EditorConfig::from_json(r#"{"change_detection": {"debounce": 0.25}}"#).unwrap();
        assert_eq!(config.change_detection.debounce, Duration::from_millis(250));
        assert_eq!(config.max_dimension, EditorConfig::DEFAULT_MAX_DIMENSION);
        assert!(config.change_detection.pixel_sampling);
    }

    #[test]
    fn negative_debounce_is_rejected() {
        let result = EditorConfig::from_json(r#"{"change_detection": {"debounce": -1.0}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn json_preserves_values() {
        let mut config = EditorConfig::default();
        config.change_detection.pixel_tolerance = 3;
        config.scale_bounds.min = 0.25;
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(EditorConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn scale_bounds_clamp() {
        let bounds = ScaleBounds::default();
        assert!((bounds.clamp(0.01) - 0.1).abs() < f64::EPSILON);
        assert!((bounds.clamp(7.0) - 1.0).abs() < f64::EPSILON);
        assert!((bounds.clamp(f64::NAN) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn inverted_bounds_are_invalid() {
        let bounds = ScaleBounds { min: 0.8, max: 0.2 };
        assert!(!bounds.is_valid());
        let zero = ScaleBounds { min: 0.0, max: 1.0 };
        assert!(!zero.is_valid());
    }
}

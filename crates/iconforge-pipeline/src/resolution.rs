//! Resolution reduction by a uniform scale factor.
//!
//! Both axes are multiplied by the factor and rounded, with a floor of
//! one pixel per axis. A factor of exactly 1.0 leaves the buffer
//! untouched.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::config::ScaleBounds;
use crate::filter::FilterError;
use crate::types::Dimensions;

/// Resampling quality.
///
/// Ordered from cheapest to most expensive interpolation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResampleQuality {
    /// Nearest-neighbor: fastest, blocky.
    Low,
    /// Bilinear: fast, decent quality.
    Medium,
    /// Lanczos with 3 lobes: slowest, sharpest.
    #[default]
    High,
}

impl ResampleQuality {
    /// Convert to the `image` crate's `FilterType`.
    #[must_use]
    pub const fn filter_type(self) -> FilterType {
        match self {
            Self::Low => FilterType::Nearest,
            Self::Medium => FilterType::Triangle,
            Self::High => FilterType::Lanczos3,
        }
    }

    /// Lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ResampleQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsing never fails: an unknown quality falls back to
/// [`ResampleQuality::High`] with a warning.
impl FromStr for ResampleQuality {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let quality = match s.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            other => {
                tracing::warn!(quality = other, "unknown resample quality, using high");
                Self::High
            }
        };
        Ok(quality)
    }
}

impl From<String> for ResampleQuality {
    fn from(s: String) -> Self {
        let Ok(quality) = s.parse();
        quality
    }
}

impl From<ResampleQuality> for String {
    fn from(quality: ResampleQuality) -> Self {
        quality.as_str().to_owned()
    }
}

/// Scales both axes by `factor`, clamped into its bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionScale {
    factor: f64,
    quality: ResampleQuality,
    bounds: ScaleBounds,
}

impl Default for ResolutionScale {
    fn default() -> Self {
        Self::with_bounds(ScaleBounds::default())
    }
}

impl ResolutionScale {
    /// Identifier used in pipelines and fingerprints.
    pub const NAME: &'static str = "resolution";

    /// Half size on both axes.
    pub const DEFAULT_FACTOR: f64 = 0.5;

    /// Default parameters inside custom bounds. Unusable bounds fall back
    /// to `[0.1, 1.0]` with a warning.
    #[must_use]
    pub fn with_bounds(bounds: ScaleBounds) -> Self {
        let bounds = if bounds.is_valid() {
            bounds
        } else {
            tracing::warn!(?bounds, "invalid scale bounds, using defaults");
            ScaleBounds::default()
        };
        Self {
            factor: bounds.clamp(Self::DEFAULT_FACTOR),
            quality: ResampleQuality::default(),
            bounds,
        }
    }

    /// A filter with the given factor (clamped) and quality.
    #[must_use]
    pub fn new(factor: f64, quality: ResampleQuality) -> Self {
        let mut filter = Self::default();
        filter.set_factor(factor);
        filter.quality = quality;
        filter
    }

    /// Current scale factor.
    #[must_use]
    pub const fn factor(&self) -> f64 {
        self.factor
    }

    /// Current resampling quality.
    #[must_use]
    pub const fn quality(&self) -> ResampleQuality {
        self.quality
    }

    /// The bounds the factor is clamped into.
    #[must_use]
    pub const fn bounds(&self) -> ScaleBounds {
        self.bounds
    }

    /// Set the factor, clamping into the bounds with a warning when the
    /// request falls outside.
    #[allow(clippy::float_cmp)]
    pub fn set_factor(&mut self, factor: f64) {
        let clamped = self.bounds.clamp(factor);
        if clamped != factor {
            tracing::warn!(
                requested = factor,
                clamped,
                min = self.bounds.min,
                max = self.bounds.max,
                "scale factor out of range"
            );
        }
        self.factor = clamped;
    }

    /// Set the resampling quality.
    pub const fn set_quality(&mut self, quality: ResampleQuality) {
        self.quality = quality;
    }

    /// Back to the default factor and quality, keeping the bounds.
    pub fn reset(&mut self) {
        *self = Self::with_bounds(self.bounds);
    }

    /// Output dimensions for a `source`-sized input.
    ///
    /// If the factor would round either axis down to zero, it is raised
    /// to `max(1/width, 1/height)` so the shorter axis keeps one pixel.
    #[must_use]
    pub fn target_dimensions(&self, source: Dimensions) -> Dimensions {
        let w = f64::from(source.width);
        let h = f64::from(source.height);
        let mut factor = self.factor;
        if (w * factor).round() < 1.0 || (h * factor).round() < 1.0 {
            factor = (1.0 / w).max(1.0 / h);
            tracing::debug!(factor, %source, "scale raised to keep a one-pixel side");
        }
        Dimensions::new(scaled_axis(w, factor), scaled_axis(h, factor))
    }

    /// Resample `source`. A factor of 1.0, or one that does not change
    /// the size, returns the source borrowed.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if the resampler produces unexpected
    /// dimensions.
    #[allow(clippy::float_cmp)]
    pub fn apply<'a>(&self, source: &'a PixelBuffer) -> Result<Cow<'a, PixelBuffer>, FilterError> {
        if self.factor == 1.0 {
            return Ok(Cow::Borrowed(source));
        }

        let target = self.target_dimensions(source.dimensions());
        if target == source.dimensions() {
            return Ok(Cow::Borrowed(source));
        }

        let resized = source
            .resized(target.width, target.height, self.quality.filter_type())
            .map_err(|e| FilterError::new(Self::NAME, e))?;
        if resized.dimensions() != target {
            return Err(FilterError::new(
                Self::NAME,
                format!("resampler produced {}, expected {target}", resized.dimensions()),
            ));
        }
        Ok(Cow::Owned(resized))
    }
}

/// `round(len * factor)`, at least 1.
#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled_axis(len: f64, factor: f64) -> u32 {
    (len * factor).round().max(1.0) as u32
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_buffer(w: u32, h: u32) -> PixelBuffer {
        PixelBuffer::filled(w, h, [128, 128, 128, 255]).unwrap()
    }

    #[test]
    fn default_quality_is_high() {
        assert_eq!(ResampleQuality::default(), ResampleQuality::High);
        assert_eq!(ResampleQuality::High.filter_type(), FilterType::Lanczos3);
    }

    #[test]
    fn factor_one_is_borrowed_noop() {
        let buf = test_buffer(100, 60);
        let out = ResolutionScale::new(1.0, ResampleQuality::High)
            .apply(&buf)
            .unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn half_scale_of_100_by_60() {
        let buf = test_buffer(100, 60);
        let out = ResolutionScale::default().apply(&buf).unwrap();
        assert_eq!(out.dimensions(), Dimensions::new(50, 30));
    }

    #[test]
    fn rounds_half_up() {
        let filter = ResolutionScale::new(0.5, ResampleQuality::Low);
        assert_eq!(
            filter.target_dimensions(Dimensions::new(101, 61)),
            Dimensions::new(51, 31)
        );
    }

    #[test]
    fn factor_is_clamped() {
        assert!((ResolutionScale::new(0.01, ResampleQuality::Low).factor() - 0.1).abs() < 1e-12);
        assert!((ResolutionScale::new(4.0, ResampleQuality::Low).factor() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tiny_axis_raises_factor() {
        let filter = ResolutionScale::new(0.1, ResampleQuality::Medium);
        // 0.1 * 2 rounds to 0, so the factor becomes 1/2.
        assert_eq!(
            filter.target_dimensions(Dimensions::new(1000, 2)),
            Dimensions::new(500, 1)
        );
        assert_eq!(
            filter.target_dimensions(Dimensions::new(1, 1)),
            Dimensions::new(1, 1)
        );
    }

    #[test]
    fn unchanged_size_is_borrowed() {
        let buf = test_buffer(1, 1);
        let out = ResolutionScale::new(0.1, ResampleQuality::High)
            .apply(&buf)
            .unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    #[expect(clippy::cast_possible_truncation)]
    fn every_quality_resamples_deterministically() {
        let image = image::RgbaImage::from_fn(40, 20, |x, y| {
            image::Rgba([(x * 6) as u8, (y * 12) as u8, 90, 255])
        });
        let buf = PixelBuffer::from_image(image).unwrap();
        for quality in [ResampleQuality::Low, ResampleQuality::Medium, ResampleQuality::High] {
            let filter = ResolutionScale::new(0.25, quality);
            let a = filter.apply(&buf).unwrap();
            let b = filter.apply(&buf).unwrap();
            assert_eq!(a.dimensions(), Dimensions::new(10, 5));
            assert_eq!(a, b, "{quality} is not deterministic");
        }
    }

    #[test]
    fn invalid_bounds_fall_back_to_defaults() {
        let filter = ResolutionScale::with_bounds(ScaleBounds { min: 0.9, max: 0.1 });
        assert_eq!(filter.bounds(), ScaleBounds::default());
    }

    #[test]
    fn custom_bounds_clamp_default_factor() {
        let filter = ResolutionScale::with_bounds(ScaleBounds { min: 0.6, max: 0.9 });
        assert!((filter.factor() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn unknown_quality_parses_to_high() {
        let quality: ResampleQuality = "ultra".parse().unwrap();
        assert_eq!(quality, ResampleQuality::High);
    }
}

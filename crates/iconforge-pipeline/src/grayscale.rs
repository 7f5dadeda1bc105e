//! Partial or full desaturation toward ITU-R BT.709 luminance.
//!
//! Each output channel is `round(c * (1 - intensity) + L * intensity)`
//! where `L = round(0.2126 R + 0.7152 G + 0.0722 B)`. Alpha is copied
//! unchanged.

use std::borrow::Cow;

use crate::buffer::PixelBuffer;
use crate::types::Rgba;

/// BT.709 luminance of one pixel, rounded to the nearest integer.
#[must_use]
#[allow(clippy::suboptimal_flops)]
pub fn luminance([r, g, b, _]: Rgba) -> u8 {
    to_channel(0.2126 * f64::from(r) + 0.7152 * f64::from(g) + 0.0722 * f64::from(b))
}

/// Blend one pixel toward its luminance.
#[must_use]
#[allow(clippy::suboptimal_flops)]
pub fn blend(pixel: Rgba, intensity: f64) -> Rgba {
    let l = f64::from(luminance(pixel));
    let keep = 1.0 - intensity;
    let mix = |c: u8| to_channel(f64::from(c) * keep + l * intensity);
    [mix(pixel[0]), mix(pixel[1]), mix(pixel[2]), pixel[3]]
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Grayscale filter with a blend intensity in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grayscale {
    intensity: f64,
}

impl Default for Grayscale {
    fn default() -> Self {
        Self {
            intensity: Self::DEFAULT_INTENSITY,
        }
    }
}

impl Grayscale {
    /// Identifier used in pipelines and fingerprints.
    pub const NAME: &'static str = "grayscale";

    /// Full desaturation.
    pub const DEFAULT_INTENSITY: f64 = 1.0;

    /// A filter with the given intensity (clamped).
    #[must_use]
    pub fn new(intensity: f64) -> Self {
        let mut filter = Self::default();
        filter.set_intensity(intensity);
        filter
    }

    /// Current intensity.
    #[must_use]
    pub const fn intensity(&self) -> f64 {
        self.intensity
    }

    /// Set the intensity. Values outside `[0, 1]` are clamped and NaN
    /// falls back to the default, both with a warning.
    pub fn set_intensity(&mut self, intensity: f64) {
        self.intensity = if intensity.is_nan() {
            tracing::warn!("grayscale intensity is NaN, using default");
            Self::DEFAULT_INTENSITY
        } else if (0.0..=1.0).contains(&intensity) {
            intensity
        } else {
            let clamped = intensity.clamp(0.0, 1.0);
            tracing::warn!(requested = intensity, clamped, "grayscale intensity out of range");
            clamped
        };
    }

    /// Desaturate `source`. Intensity 0 returns the source borrowed.
    #[must_use]
    pub fn apply<'a>(&self, source: &'a PixelBuffer) -> Cow<'a, PixelBuffer> {
        if self.intensity <= 0.0 {
            return Cow::Borrowed(source);
        }

        let intensity = self.intensity;
        Cow::Owned(source.map_pixels(|pixel| blend(pixel, intensity)))
    }
}

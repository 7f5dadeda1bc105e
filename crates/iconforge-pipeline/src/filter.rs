//! The filter capability and the closed set of built-in filters.
//!
//! Filters are pure transforms from one [`PixelBuffer`] to another.
//! They never mutate their input: a filter that has nothing to do
//! returns the source borrowed, one that does work returns a newly
//! allocated buffer.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::config::ScaleBounds;
use crate::grayscale::Grayscale;
use crate::resolution::{ResampleQuality, ResolutionScale};
use crate::square::{CropAnchor, SquareCrop};

/// One filter failed to produce output.
///
/// Carries only strings so it can cross a thread or serialization
/// boundary unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("filter '{filter}' failed: {cause}")]
pub struct FilterError {
    /// Name of the failing filter.
    pub filter: String,
    /// Human-readable cause.
    pub cause: String,
}

impl FilterError {
    /// Build an error for `filter` from any displayable cause.
    pub fn new(filter: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self {
            filter: filter.into(),
            cause: cause.to_string(),
        }
    }
}

/// The parameters of one filter, tagged by shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterValue {
    /// Square crop anchor.
    Anchor {
        /// Which edge or center the crop window hugs.
        anchor: CropAnchor,
    },
    /// Grayscale blend strength.
    Intensity {
        /// 0.0 leaves colors untouched, 1.0 fully desaturates.
        intensity: f64,
    },
    /// Resolution reduction.
    Scale {
        /// Multiplier applied to both axes.
        factor: f64,
        /// Resampling kernel selector.
        quality: ResampleQuality,
    },
}

/// A named, parameterized transform from one pixel buffer to another.
pub trait Filter {
    /// Stable identifier used for lookup, ordering and fingerprints.
    fn name(&self) -> &str;

    /// Current parameters.
    fn value(&self) -> FilterValue;

    /// Transform `source` without mutating it.
    ///
    /// Returns `Cow::Borrowed(source)` when the filter is a no-op for
    /// this input.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] on an internal fault. The output must
    /// never be a buffer with a zero axis.
    fn apply<'a>(&self, source: &'a PixelBuffer) -> Result<Cow<'a, PixelBuffer>, FilterError>;

    /// Replace the parameters. Out-of-range values are clamped or
    /// defaulted with a logged warning.
    ///
    /// Returns `false` if `value` is the wrong shape for this filter.
    fn configure(&mut self, value: FilterValue) -> bool;

    /// Restore default parameters.
    fn reset(&mut self);
}

/// The built-in filters.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind {
    /// Crop to the largest centered (or edge-anchored) square.
    SquareCrop(SquareCrop),
    /// Blend toward BT.709 luminance.
    Grayscale(Grayscale),
    /// Scale both axes down by a factor.
    ResolutionScale(ResolutionScale),
}

impl FilterKind {
    /// The registration table: every built-in filter with default
    /// parameters, in default pipeline order.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        Self::defaults_with(ScaleBounds::default())
    }

    /// Like [`defaults`](Self::defaults) with custom scale bounds for the
    /// resolution filter.
    #[must_use]
    pub fn defaults_with(bounds: ScaleBounds) -> Vec<Self> {
        vec![
            Self::SquareCrop(SquareCrop::default()),
            Self::Grayscale(Grayscale::default()),
            Self::ResolutionScale(ResolutionScale::with_bounds(bounds)),
        ]
    }
}

impl Filter for FilterKind {
    fn name(&self) -> &str {
        match self {
            Self::SquareCrop(_) => SquareCrop::NAME,
            Self::Grayscale(_) => Grayscale::NAME,
            Self::ResolutionScale(_) => ResolutionScale::NAME,
        }
    }

    fn value(&self) -> FilterValue {
        match self {
            Self::SquareCrop(f) => FilterValue::Anchor { anchor: f.anchor() },
            Self::Grayscale(f) => FilterValue::Intensity {
                intensity: f.intensity(),
            },
            Self::ResolutionScale(f) => FilterValue::Scale {
                factor: f.factor(),
                quality: f.quality(),
            },
        }
    }

    fn apply<'a>(&self, source: &'a PixelBuffer) -> Result<Cow<'a, PixelBuffer>, FilterError> {
        match self {
            Self::SquareCrop(f) => f.apply(source),
            Self::Grayscale(f) => Ok(f.apply(source)),
            Self::ResolutionScale(f) => f.apply(source),
        }
    }

    fn configure(&mut self, value: FilterValue) -> bool {
        match (self, value) {
            (Self::SquareCrop(f), FilterValue::Anchor { anchor }) => {
                f.set_anchor(anchor);
                true
            }
            (Self::Grayscale(f), FilterValue::Intensity { intensity }) => {
                f.set_intensity(intensity);
                true
            }
            (Self::ResolutionScale(f), FilterValue::Scale { factor, quality }) => {
                f.set_factor(factor);
                f.set_quality(quality);
                true
            }
            (filter, value) => {
                tracing::warn!(
                    filter = filter.name(),
                    ?value,
                    "parameter shape does not match filter, ignoring"
                );
                false
            }
        }
    }

    fn reset(&mut self) {
        match self {
            Self::SquareCrop(f) => *f = SquareCrop::default(),
            Self::Grayscale(f) => *f = Grayscale::default(),
            Self::ResolutionScale(f) => f.reset(),
        }
    }
}

/// Enabled flag and parameters of one filter, as seen by the change
/// detector and by pipeline snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    /// Whether the filter takes part in recomputes.
    pub enabled: bool,
    /// Current parameters.
    pub value: FilterValue,
}

/// `{name: {enabled, value}}` for every filter in a pipeline.
///
/// Keyed by name so the comparison does not depend on pipeline order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterFingerprint(pub BTreeMap<String, FilterState>);

impl FilterFingerprint {
    /// Look up one filter's state.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FilterState> {
        self.0.get(name)
    }

    /// Name of the first filter whose enabled flag or value differs from
    /// `previous`, or that `previous` does not know about.
    #[must_use]
    pub fn first_difference<'a>(&'a self, previous: &'a Self) -> Option<&'a str> {
        self.0
            .iter()
            .find(|(name, state)| previous.get(name) != Some(*state))
            .map(|(name, _)| name.as_str())
            .or_else(|| {
                previous
                    .0
                    .keys()
                    .find(|name| !self.0.contains_key(*name))
                    .map(String::as_str)
            })
    }
}

//! Shared types for the iconforge filter pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so downstream crates can hand decoded images
/// to [`PixelBuffer`](crate::PixelBuffer) without depending on `image`
/// directly.
pub use image::RgbaImage;

/// One RGBA pixel, 8 bits per channel.
pub type Rgba = [u8; 4];

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new pair of dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` when both sides are equal.
    #[must_use]
    pub const fn is_square(self) -> bool {
        self.width == self.height
    }

    /// Largest per-axis difference to `other`, in pixels.
    #[must_use]
    pub const fn max_axis_delta(self, other: Self) -> u32 {
        let dw = self.width.abs_diff(other.width);
        let dh = self.height.abs_diff(other.height);
        if dw > dh { dw } else { dh }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Errors raised when constructing a [`PixelBuffer`](crate::PixelBuffer).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PixelBufferError {
    /// One of the axes is zero.
    #[error("pixel buffer dimensions must be non-zero, got {0}")]
    ZeroDimension(Dimensions),

    /// The byte length does not match `width * height * 4`.
    #[error("pixel data for {dimensions} must be {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Declared dimensions.
        dimensions: Dimensions,
        /// Required byte length.
        expected: usize,
        /// Supplied byte length.
        actual: usize,
    },
}

/// Input rejected before it reaches the filter pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The input exceeds the configured byte limit.
    #[error("input is {size} bytes, exceeding the {limit}-byte limit")]
    TooLarge {
        /// Size of the rejected input.
        size: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// The declared MIME type is not one we accept.
    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    /// The leading bytes do not carry the signature of the declared type.
    #[error("content does not match declared type {declared}")]
    SignatureMismatch {
        /// The MIME type the caller claimed.
        declared: String,
    },

    /// The codec could not decode the data.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Decoded dimensions fall outside the accepted range.
    #[error("image dimensions {dimensions} outside the accepted range 1..={max}")]
    DimensionsOutOfRange {
        /// Decoded dimensions.
        dimensions: Dimensions,
        /// Configured maximum side length.
        max: u32,
    },

    /// A requested parameter (size, scale, ...) is invalid.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The decoded raster could not be wrapped in a pixel buffer.
    #[error(transparent)]
    Buffer(#[from] PixelBufferError),
}

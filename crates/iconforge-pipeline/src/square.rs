//! Square crop: cut the largest square out of a rectangular buffer.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::filter::FilterError;

/// Where the crop window sits along the longer axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CropAnchor {
    /// Centered on both axes.
    #[default]
    Center,
    /// Hug the top edge (centered horizontally).
    Top,
    /// Hug the bottom edge (centered horizontally).
    Bottom,
    /// Hug the left edge (centered vertically).
    Left,
    /// Hug the right edge (centered vertically).
    Right,
}

impl CropAnchor {
    /// Every anchor, in display order.
    pub const ALL: [Self; 5] = [Self::Center, Self::Top, Self::Bottom, Self::Left, Self::Right];

    /// Top-left corner of a `side`-sized square inside a `width` x
    /// `height` buffer. `side` must not exceed either axis.
    #[must_use]
    pub const fn origin(self, width: u32, height: u32, side: u32) -> (u32, u32) {
        let spare_x = width - side;
        let spare_y = height - side;
        match self {
            Self::Center => (spare_x / 2, spare_y / 2),
            Self::Top => (spare_x / 2, 0),
            Self::Bottom => (spare_x / 2, spare_y),
            Self::Left => (0, spare_y / 2),
            Self::Right => (spare_x, spare_y / 2),
        }
    }

    /// Lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for CropAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsing never fails: an unknown anchor falls back to
/// [`CropAnchor::Center`] with a warning.
impl FromStr for CropAnchor {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let anchor = match s.trim().to_ascii_lowercase().as_str() {
            "center" | "centre" => Self::Center,
            "top" => Self::Top,
            "bottom" => Self::Bottom,
            "left" => Self::Left,
            "right" => Self::Right,
            other => {
                tracing::warn!(anchor = other, "unknown crop anchor, using center");
                Self::Center
            }
        };
        Ok(anchor)
    }
}

impl From<String> for CropAnchor {
    fn from(s: String) -> Self {
        let Ok(anchor) = s.parse();
        anchor
    }
}

impl From<CropAnchor> for String {
    fn from(anchor: CropAnchor) -> Self {
        anchor.as_str().to_owned()
    }
}

/// Crops to `min(width, height)` on both axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SquareCrop {
    anchor: CropAnchor,
}

impl SquareCrop {
    /// Identifier used in pipelines and fingerprints.
    pub const NAME: &'static str = "square";

    /// A crop with the given anchor.
    #[must_use]
    pub const fn new(anchor: CropAnchor) -> Self {
        Self { anchor }
    }

    /// Current anchor.
    #[must_use]
    pub const fn anchor(&self) -> CropAnchor {
        self.anchor
    }

    /// Change the anchor.
    pub const fn set_anchor(&mut self, anchor: CropAnchor) {
        self.anchor = anchor;
    }

    /// Crop `source` to a square. Already-square input is returned
    /// borrowed.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if the region copy fails.
    pub fn apply<'a>(&self, source: &'a PixelBuffer) -> Result<Cow<'a, PixelBuffer>, FilterError> {
        let (width, height) = (source.width(), source.height());
        if width == height {
            return Ok(Cow::Borrowed(source));
        }

        let side = width.min(height);
        let (x, y) = self.anchor.origin(width, height, side);
        tracing::debug!(anchor = %self.anchor, x, y, side, "square crop");

        source
            .with_region(x, y, side, side)
            .map(Cow::Owned)
            .map_err(|e| FilterError::new(Self::NAME, e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Dimensions;

    /// Buffer whose red channel encodes `x` and green encodes `y`.
    #[expect(clippy::cast_possible_truncation)]
    fn coordinate_buffer(width: u32, height: u32) -> PixelBuffer {
        let image = image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([x as u8, y as u8, 0, 255])
        });
        PixelBuffer::from_image(image).unwrap()
    }

    #[test]
    fn square_input_is_borrowed_for_every_anchor() {
        let buf = coordinate_buffer(8, 8);
        for anchor in CropAnchor::ALL {
            let out = SquareCrop::new(anchor).apply(&buf).unwrap();
            assert!(matches!(out, Cow::Borrowed(_)), "{anchor} copied");
            assert_eq!(*out, buf);
        }
    }

    #[test]
    fn center_crop_of_landscape() {
        let buf = coordinate_buffer(100, 60);
        let out = SquareCrop::default().apply(&buf).unwrap();
        assert_eq!(out.dimensions(), Dimensions::new(60, 60));
        // Crop starts at (20, 0).
        assert_eq!(out.pixel(0, 0), Some([20, 0, 0, 255]));
        assert_eq!(out.pixel(59, 59), Some([79, 59, 0, 255]));
    }

    #[test]
    fn origins_per_anchor() {
        assert_eq!(CropAnchor::Center.origin(100, 60, 60), (20, 0));
        assert_eq!(CropAnchor::Top.origin(60, 100, 60), (0, 0));
        assert_eq!(CropAnchor::Bottom.origin(60, 100, 60), (0, 40));
        assert_eq!(CropAnchor::Left.origin(100, 60, 60), (0, 0));
        assert_eq!(CropAnchor::Right.origin(100, 60, 60), (40, 0));
        // Odd spare space floors.
        assert_eq!(CropAnchor::Center.origin(61, 60, 60), (0, 0));
        assert_eq!(CropAnchor::Center.origin(60, 63, 60), (0, 1));
    }

    #[test]
    fn bottom_crop_of_portrait_reads_last_rows() {
        let buf = coordinate_buffer(4, 10);
        let out = SquareCrop::new(CropAnchor::Bottom).apply(&buf).unwrap();
        assert_eq!(out.dimensions(), Dimensions::new(4, 4));
        assert_eq!(out.pixel(0, 0), Some([0, 6, 0, 255]));
        assert_eq!(out.pixel(3, 3), Some([3, 9, 0, 255]));
    }

    #[test]
    fn source_is_not_mutated() {
        let buf = coordinate_buffer(30, 10);
        let before = buf.clone();
        let _ = SquareCrop::new(CropAnchor::Right).apply(&buf).unwrap();
        assert_eq!(buf, before);
    }

    #[test]
    fn unknown_anchor_parses_to_center() {
        let anchor: CropAnchor = "diagonal".parse().unwrap();
        assert_eq!(anchor, CropAnchor::Center);
        let anchor: CropAnchor = " Left ".parse().unwrap();
        assert_eq!(anchor, CropAnchor::Left);
    }

    #[test]
    fn unknown_anchor_deserializes_to_center() {
        let anchor: CropAnchor = serde_json::from_str("\"sideways\"").unwrap();
        assert_eq!(anchor, CropAnchor::Center);
        assert_eq!(serde_json::to_string(&CropAnchor::Top).unwrap(), "\"top\"");
    }
}

//! The RGBA raster value every filter consumes and produces.
//!
//! A [`PixelBuffer`] wraps an `image::RgbaImage` and guarantees that
//! both axes are non-zero. Transforms never mutate a buffer in place;
//! they allocate a new one. The only mutating accessor,
//! [`set_pixel`](PixelBuffer::set_pixel), exists for building freshly
//! allocated buffers.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, PixelBufferError, Rgba, RgbaImage};

/// Bytes per pixel (RGBA, 8 bits per channel).
pub const CHANNELS: usize = 4;

/// An RGBA raster with non-zero dimensions, row-major, 8 bits per channel.
///
/// `Clone` is a deep copy of the pixel bytes.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    /// Wrap raw RGBA bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PixelBufferError::ZeroDimension`] if either axis is zero
    /// and [`PixelBufferError::LengthMismatch`] if `pixels.len()` is not
    /// `width * height * 4`.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, PixelBufferError> {
        let dimensions = Dimensions::new(width, height);
        if width == 0 || height == 0 {
            return Err(PixelBufferError::ZeroDimension(dimensions));
        }
        let expected = byte_len(width, height);
        let actual = pixels.len();
        RgbaImage::from_raw(width, height, pixels)
            .filter(|_| actual == expected)
            .map(|image| Self { image })
            .ok_or(PixelBufferError::LengthMismatch {
                dimensions,
                expected,
                actual,
            })
    }

    /// A buffer where every pixel has the same color.
    ///
    /// # Errors
    ///
    /// Returns [`PixelBufferError::ZeroDimension`] if either axis is zero.
    pub fn filled(width: u32, height: u32, rgba: Rgba) -> Result<Self, PixelBufferError> {
        if width == 0 || height == 0 {
            return Err(PixelBufferError::ZeroDimension(Dimensions::new(width, height)));
        }
        Ok(Self {
            image: RgbaImage::from_pixel(width, height, image::Rgba(rgba)),
        })
    }

    /// Wrap an already-decoded `RgbaImage`.
    ///
    /// # Errors
    ///
    /// Returns [`PixelBufferError::ZeroDimension`] for an empty image.
    pub fn from_image(image: RgbaImage) -> Result<Self, PixelBufferError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PixelBufferError::ZeroDimension(Dimensions::new(
                image.width(),
                image.height(),
            )));
        }
        Ok(Self { image })
    }

    /// Width in pixels (never zero).
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels (never zero).
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Width and height.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }

    /// Raw RGBA bytes, row-major.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Borrow the underlying `RgbaImage` (for codecs and resamplers).
    #[must_use]
    pub const fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// Consume the buffer and return the underlying `RgbaImage`.
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Read one pixel, or `None` outside the buffer.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        self.image.get_pixel_checked(x, y).map(|p| p.0)
    }

    /// Write one pixel. Returns `false` (and writes nothing) outside the
    /// buffer.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: Rgba) -> bool {
        self.image.get_pixel_mut_checked(x, y).is_some_and(|p| {
            p.0 = rgba;
            true
        })
    }

    /// A new buffer of the same size with `f` applied to every pixel.
    #[must_use]
    pub fn map_pixels(&self, mut f: impl FnMut(Rgba) -> Rgba) -> Self {
        let mut image = self.image.clone();
        for pixel in image.pixels_mut() {
            pixel.0 = f(pixel.0);
        }
        Self { image }
    }

    /// Copy a rectangular region into a newly allocated buffer.
    ///
    /// Rows are copied verbatim. Parts of the region that fall outside
    /// the source are skipped and stay fully transparent.
    ///
    /// # Errors
    ///
    /// Returns [`PixelBufferError::ZeroDimension`] if `width` or `height`
    /// is zero.
    pub fn with_region(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Self, PixelBufferError> {
        if width == 0 || height == 0 {
            return Err(PixelBufferError::ZeroDimension(Dimensions::new(width, height)));
        }

        let mut out = vec![0u8; byte_len(width, height)];
        let src = self.pixels();
        let src_w = self.width();
        let src_h = self.height();

        // Horizontal span of the region that overlaps the source.
        let copy_x_end = x.saturating_add(width).min(src_w);
        if x < copy_x_end {
            let span = (copy_x_end - x) as usize * CHANNELS;
            for row in 0..height {
                let Some(src_y) = y.checked_add(row).filter(|&sy| sy < src_h) else {
                    continue;
                };
                let src_start = (src_y as usize * src_w as usize + x as usize) * CHANNELS;
                let dst_start = row as usize * width as usize * CHANNELS;
                out[dst_start..dst_start + span]
                    .copy_from_slice(&src[src_start..src_start + span]);
            }
        }

        Self::new(width, height, out)
    }

    /// Resample to exactly `width` x `height` with the given kernel.
    ///
    /// # Errors
    ///
    /// Returns [`PixelBufferError::ZeroDimension`] if a target axis is
    /// zero.
    pub fn resized(
        &self,
        width: u32,
        height: u32,
        filter: FilterType,
    ) -> Result<Self, PixelBufferError> {
        if width == 0 || height == 0 {
            return Err(PixelBufferError::ZeroDimension(Dimensions::new(width, height)));
        }
        Self::from_image(image::imageops::resize(&self.image, width, height, filter))
    }
}

impl PartialEq for PixelBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.dimensions() == other.dimensions() && self.pixels() == other.pixels()
    }
}

impl Eq for PixelBuffer {}

/// Serde-compatible proxy for `PixelBuffer`.
///
/// `image::ImageBuffer` does not implement serde traits, so buffers
/// travel as `(width, height, raw_pixels)` tuples.
#[derive(Serialize, Deserialize)]
struct PixelBufferProxy(u32, u32, Vec<u8>);

impl Serialize for PixelBuffer {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PixelBufferProxy(self.width(), self.height(), self.pixels().to_vec()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PixelBuffer {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let PixelBufferProxy(width, height, pixels) = PixelBufferProxy::deserialize(deserializer)?;
        Self::new(width, height, pixels).map_err(serde::de::Error::custom)
    }
}

/// Byte length of a `width` x `height` RGBA raster.
#[must_use]
pub const fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Buffer whose red channel encodes `x`, green encodes `y`.
    #[expect(clippy::cast_possible_truncation)]
    fn coordinate_buffer(width: u32, height: u32) -> PixelBuffer {
        let mut pixels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[x as u8, y as u8, 7, 255]);
            }
        }
        PixelBuffer::new(width, height, pixels).unwrap()
    }

    #[test]
    fn new_rejects_zero_dimension() {
        let result = PixelBuffer::new(0, 5, Vec::new());
        assert!(matches!(result, Err(PixelBufferError::ZeroDimension(_))));
    }

    #[test]
    fn new_rejects_length_mismatch() {
        let result = PixelBuffer::new(2, 2, vec![0; 15]);
        assert!(matches!(
            result,
            Err(PixelBufferError::LengthMismatch {
                expected: 16,
                actual: 15,
                ..
            })
        ));
    }

    #[test]
    fn new_rejects_oversized_data() {
        let result = PixelBuffer::new(2, 2, vec![0; 20]);
        assert!(matches!(
            result,
            Err(PixelBufferError::LengthMismatch { actual: 20, .. })
        ));
    }

    #[test]
    fn clone_is_deep() {
        let a = PixelBuffer::filled(2, 2, [1, 2, 3, 4]).unwrap();
        let mut b = a.clone();
        assert!(b.set_pixel(0, 0, [9, 9, 9, 9]));
        assert_eq!(a.pixel(0, 0), Some([1, 2, 3, 4]));
        assert_eq!(b.pixel(0, 0), Some([9, 9, 9, 9]));
    }

    #[test]
    fn pixel_out_of_bounds_is_none() {
        let buf = PixelBuffer::filled(2, 2, [0; 4]).unwrap();
        assert_eq!(buf.pixel(2, 0), None);
        assert_eq!(buf.pixel(0, 2), None);
    }

    #[test]
    fn set_pixel_out_of_bounds_is_ignored() {
        let mut buf = PixelBuffer::filled(2, 2, [0; 4]).unwrap();
        let before = buf.clone();
        assert!(!buf.set_pixel(5, 5, [1, 1, 1, 1]));
        assert_eq!(buf, before);
    }

    #[test]
    fn map_pixels_allocates_new_buffer() {
        let buf = PixelBuffer::filled(3, 2, [10, 20, 30, 40]).unwrap();
        let inverted = buf.map_pixels(|[r, g, b, a]| [255 - r, 255 - g, 255 - b, a]);
        assert_eq!(inverted.pixel(2, 1), Some([245, 235, 225, 40]));
        assert_eq!(buf.pixel(2, 1), Some([10, 20, 30, 40]));
    }

    #[test]
    fn with_region_copies_rows_verbatim() {
        let buf = coordinate_buffer(4, 3);
        let region = buf.with_region(1, 1, 2, 2).unwrap();
        assert_eq!(region.dimensions(), Dimensions::new(2, 2));
        assert_eq!(region.pixel(0, 0), Some([1, 1, 7, 255]));
        assert_eq!(region.pixel(1, 0), Some([2, 1, 7, 255]));
        assert_eq!(region.pixel(0, 1), Some([1, 2, 7, 255]));
        assert_eq!(region.pixel(1, 1), Some([2, 2, 7, 255]));
    }

    #[test]
    fn with_region_skips_out_of_range_source() {
        let buf = coordinate_buffer(4, 3);
        let region = buf.with_region(3, 2, 2, 2).unwrap();
        assert_eq!(region.pixel(0, 0), Some([3, 2, 7, 255]));
        // Everything past the source edge stays transparent black.
        assert_eq!(region.pixel(1, 0), Some([0, 0, 0, 0]));
        assert_eq!(region.pixel(0, 1), Some([0, 0, 0, 0]));
        assert_eq!(region.pixel(1, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn with_region_leaves_source_untouched() {
        let buf = coordinate_buffer(4, 3);
        let before = buf.clone();
        let _ = buf.with_region(0, 0, 3, 3).unwrap();
        assert_eq!(buf, before);
    }

    #[test]
    fn with_region_rejects_zero_size() {
        let buf = coordinate_buffer(4, 3);
        assert!(buf.with_region(0, 0, 0, 3).is_err());
    }

    #[test]
    fn resized_produces_requested_dimensions() {
        let buf = coordinate_buffer(10, 6);
        let small = buf.resized(5, 3, FilterType::Triangle).unwrap();
        assert_eq!(small.dimensions(), Dimensions::new(5, 3));
    }

    #[test]
    fn serde_rejects_inconsistent_proxy() {
        let json = "[2,2,[0,0,0,0]]";
        let result: Result<PixelBuffer, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn serde_preserves_pixels() {
        let buf = coordinate_buffer(3, 2);
        let json = serde_json::to_string(&buf).unwrap();
        let back: PixelBuffer = serde_json::from_str(&json).unwrap();
        assert_eq!(buf, back);
    }
}

//! Decode boundary: raw bytes plus a declared MIME type in,
//! [`PixelBuffer`] out.
//!
//! The declared type is never trusted on its own. Input is rejected
//! before decoding unless its leading bytes carry the signature of the
//! declared type, and after reading the header unless the dimensions
//! fall inside the configured range.

use std::fmt;
use std::io::Cursor;

use image::{ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::config::EditorConfig;
use crate::types::{Dimensions, ValidationError};

/// Raster formats accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// JPEG / JFIF.
    Jpeg,
    /// PNG.
    Png,
    /// WebP (RIFF container).
    WebP,
    /// GIF (first frame).
    Gif,
    /// Windows bitmap.
    Bmp,
    /// TIFF.
    Tiff,
}

impl ImageKind {
    /// Every accepted kind.
    pub const ALL: [Self; 6] = [
        Self::Jpeg,
        Self::Png,
        Self::WebP,
        Self::Gif,
        Self::Bmp,
        Self::Tiff,
    ];

    /// Canonical MIME type.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
        }
    }

    /// Parse a MIME type. `image/jpg` is accepted as an alias.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        match mime.as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::WebP),
            "image/gif" => Some(Self::Gif),
            "image/bmp" => Some(Self::Bmp),
            "image/tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Guess from a file extension (without the dot).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Leading bytes every file of this kind starts with. TIFF has two
    /// byte orders.
    #[must_use]
    pub const fn signatures(self) -> &'static [&'static [u8]] {
        match self {
            Self::Jpeg => &[&[0xFF, 0xD8, 0xFF]],
            Self::Png => &[&[0x89, 0x50, 0x4E, 0x47]],
            Self::WebP => &[&[0x52, 0x49, 0x46, 0x46]],
            Self::Gif => &[&[0x47, 0x49, 0x46]],
            Self::Bmp => &[&[0x42, 0x4D]],
            Self::Tiff => &[&[0x49, 0x49, 0x2A, 0x00], &[0x4D, 0x4D, 0x00, 0x2A]],
        }
    }

    /// Whether `bytes` starts with one of this kind's signatures.
    #[must_use]
    pub fn matches(self, bytes: &[u8]) -> bool {
        self.signatures().iter().any(|sig| bytes.starts_with(sig))
    }

    /// Identify the kind from content alone.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.matches(bytes))
    }

    const fn format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
            Self::Gif => ImageFormat::Gif,
            Self::Bmp => ImageFormat::Bmp,
            Self::Tiff => ImageFormat::Tiff,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Check size, type and signature without decoding.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyInput`],
/// [`ValidationError::TooLarge`], [`ValidationError::UnsupportedType`]
/// or [`ValidationError::SignatureMismatch`].
pub fn validate(
    bytes: &[u8],
    declared_mime: &str,
    config: &EditorConfig,
) -> Result<ImageKind, ValidationError> {
    if bytes.is_empty() {
        return Err(ValidationError::EmptyInput);
    }
    if bytes.len() > config.max_input_bytes {
        return Err(ValidationError::TooLarge {
            size: bytes.len(),
            limit: config.max_input_bytes,
        });
    }
    let kind = ImageKind::from_mime(declared_mime)
        .ok_or_else(|| ValidationError::UnsupportedType(declared_mime.to_owned()))?;
    if !kind.matches(bytes) {
        return Err(ValidationError::SignatureMismatch {
            declared: declared_mime.to_owned(),
        });
    }
    Ok(kind)
}

/// Validate and decode to RGBA.
///
/// Dimensions are read from the header and checked against
/// `config.max_dimension` before the pixel data is decoded.
///
/// # Errors
///
/// Any [`validate`] error, [`ValidationError::ImageDecode`] for corrupt
/// data and [`ValidationError::DimensionsOutOfRange`] for empty or
/// oversized images.
pub fn decode(
    bytes: &[u8],
    declared_mime: &str,
    config: &EditorConfig,
) -> Result<PixelBuffer, ValidationError> {
    let kind = validate(bytes, declared_mime, config)?;

    let (width, height) = ImageReader::with_format(Cursor::new(bytes), kind.format())
        .into_dimensions()?;
    let dimensions = Dimensions::new(width, height);
    let in_range = |side: u32| (1..=config.max_dimension).contains(&side);
    if !in_range(width) || !in_range(height) {
        return Err(ValidationError::DimensionsOutOfRange {
            dimensions,
            max: config.max_dimension,
        });
    }

    let image = image::load_from_memory_with_format(bytes, kind.format())?;
    let buffer = PixelBuffer::from_image(image.to_rgba8())?;
    tracing::debug!(%kind, %dimensions, bytes = bytes.len(), "decoded image");
    Ok(buffer)
}

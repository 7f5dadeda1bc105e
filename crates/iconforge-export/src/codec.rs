//! Output codecs: [`PixelBuffer`] in, encoded bytes out.

use std::fmt;

use iconforge_pipeline::PixelBuffer;
use image::codecs::bmp::BmpEncoder;
use image::codecs::ico::IcoEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};

use crate::config::ExportConfig;
use crate::error::CodecError;

/// Formats an export can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless PNG.
    #[default]
    Png,
    /// Lossy JPEG. Alpha is dropped.
    Jpeg,
    /// Lossless WebP.
    WebP,
    /// Uncompressed Windows bitmap.
    Bmp,
    /// Single-image Windows icon (PNG payload).
    Ico,
}

impl OutputFormat {
    /// Every supported output format.
    pub const ALL: [Self; 5] = [Self::Png, Self::Jpeg, Self::WebP, Self::Bmp, Self::Ico];

    /// MIME type of the encoded output.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Bmp => "image/bmp",
            Self::Ico => "image/x-icon",
        }
    }

    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
            Self::Bmp => "bmp",
            Self::Ico => "ico",
        }
    }

    /// Parse a file extension (without the dot).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "bmp" => Some(Self::Bmp),
            "ico" => Some(Self::Ico),
            _ => None,
        }
    }

    /// Configured quality for lossy formats, `None` for the rest.
    #[must_use]
    pub const fn default_quality(self, config: &ExportConfig) -> Option<u8> {
        match self {
            Self::Jpeg => Some(config.jpeg_quality),
            Self::WebP => Some(config.webp_quality),
            Self::Png | Self::Bmp | Self::Ico => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encode `buffer` as `format`, replacing the contents of `out`.
///
/// `quality` only affects JPEG; it is clamped to `1..=100` and
/// defaults to [`ExportConfig::DEFAULT_JPEG_QUALITY`].
///
/// # Errors
///
/// Returns [`CodecError`] if the encoder rejects the buffer (for
/// example an ICO larger than 256 px).
pub fn encode_into(
    buffer: &PixelBuffer,
    format: OutputFormat,
    quality: Option<u8>,
    out: &mut Vec<u8>,
) -> Result<(), CodecError> {
    out.clear();
    let (width, height) = (buffer.width(), buffer.height());
    let rgba = ExtendedColorType::Rgba8;

    let result = match format {
        OutputFormat::Png => PngEncoder::new(&mut *out).write_image(buffer.pixels(), width, height, rgba),
        OutputFormat::Jpeg => {
            let quality = quality
                .unwrap_or(ExportConfig::DEFAULT_JPEG_QUALITY)
                .clamp(1, 100);
            let rgb = image::DynamicImage::ImageRgba8(buffer.as_image().clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut *out, quality).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
        OutputFormat::WebP => {
            WebPEncoder::new_lossless(&mut *out).write_image(buffer.pixels(), width, height, rgba)
        }
        OutputFormat::Bmp => BmpEncoder::new(out).write_image(buffer.pixels(), width, height, rgba),
        OutputFormat::Ico => IcoEncoder::new(&mut *out).write_image(buffer.pixels(), width, height, rgba),
    };

    result.map_err(|e| CodecError::new(format, e))
}

/// Encode `buffer` into a fresh byte vector.
///
/// # Errors
///
/// See [`encode_into`].
pub fn encode(
    buffer: &PixelBuffer,
    format: OutputFormat,
    quality: Option<u8>,
) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    encode_into(buffer, format, quality, &mut out)?;
    tracing::debug!(%format, bytes = out.len(), dimensions = %buffer.dimensions(), "encoded");
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use iconforge_pipeline::ImageKind;

    use super::*;

    #[expect(clippy::cast_possible_truncation)]
    fn noisy(width: u32, height: u32) -> PixelBuffer {
        let image = image::RgbaImage::from_fn(width, height, |x, y| {
            let v = x.wrapping_mul(73) ^ y.wrapping_mul(151);
            image::Rgba([v as u8, (v >> 2) as u8, (v >> 4) as u8, 255])
        });
        PixelBuffer::from_image(image).unwrap()
    }

    #[test]
    fn outputs_carry_expected_signatures() {
        let buf = noisy(20, 12);
        let expect = [
            (OutputFormat::Png, ImageKind::Png),
            (OutputFormat::Jpeg, ImageKind::Jpeg),
            (OutputFormat::WebP, ImageKind::WebP),
            (OutputFormat::Bmp, ImageKind::Bmp),
        ];
        for (format, kind) in expect {
            let bytes = encode(&buf, format, None).unwrap();
            assert_eq!(ImageKind::sniff(&bytes), Some(kind), "{format}");
        }
    }

    #[test]
    fn ico_header() {
        let bytes = encode(&noisy(16, 16), OutputFormat::Ico, None).unwrap();
        assert_eq!(&bytes[..4], &[0, 0, 1, 0]);
        // one image in the directory
        assert_eq!(&bytes[4..6], &[1, 0]);
    }

    #[test]
    fn ico_rejects_oversized_images() {
        let err = encode(&noisy(300, 300), OutputFormat::Ico, None).unwrap_err();
        assert_eq!(err.format, OutputFormat::Ico);
    }

    #[test]
    fn jpeg_quality_changes_size() {
        let buf = noisy(64, 64);
        let low = encode(&buf, OutputFormat::Jpeg, Some(10)).unwrap();
        let high = encode(&buf, OutputFormat::Jpeg, Some(95)).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn encode_into_replaces_previous_contents() {
        let mut out = vec![0xAA; 1000];
        encode_into(&noisy(4, 4), OutputFormat::Png, None, &mut out).unwrap();
        assert_eq!(ImageKind::sniff(&out), Some(ImageKind::Png));
    }

    #[test]
    fn format_metadata() {
        assert_eq!(OutputFormat::from_extension("JPEG"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::Ico.mime(), "image/x-icon");
        assert_eq!(
            OutputFormat::Jpeg.default_quality(&ExportConfig::default()),
            Some(90)
        );
        assert_eq!(OutputFormat::Png.default_quality(&ExportConfig::default()), None);
    }
}

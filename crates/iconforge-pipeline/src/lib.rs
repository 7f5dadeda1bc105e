//! iconforge-pipeline: pixel-buffer filter pipeline (sans-IO).
//!
//! Loads raster images into [`PixelBuffer`]s and transforms them through
//! an ordered, per-document pipeline of filters:
//! square crop -> grayscale -> resolution scale (default order).
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and buffers. Export, encoding and background workers
//! live in `iconforge-export`; the filesystem lives in the `iconforge`
//! CLI.

pub mod buffer;
pub mod change;
pub mod config;
pub mod decode;
pub mod document;
pub mod filter;
pub mod grayscale;
pub mod pipeline;
pub mod resolution;
pub mod square;
pub mod types;

pub use buffer::PixelBuffer;
pub use change::{ChangeDetector, ChangeReason, ChangeVerdict, Debouncer, DetectorState};
pub use config::{ChangeDetectionConfig, EditorConfig, ScaleBounds};
pub use decode::{ImageKind, decode};
pub use document::{DocumentContext, DocumentId, DocumentInfo, DocumentRegistry, RegistryStats};
pub use filter::{Filter, FilterError, FilterFingerprint, FilterKind, FilterState, FilterValue};
pub use grayscale::Grayscale;
pub use pipeline::{
    FilterPipeline, PipelineReport, PipelineSnapshot, PipelineStats, Recompute, ReorderError,
    RunSummary, StepOutcome,
};
pub use resolution::{ResampleQuality, ResolutionScale};
pub use square::{CropAnchor, SquareCrop};
pub use types::{Dimensions, PixelBufferError, Rgba, RgbaImage, ValidationError};

/// Decode `bytes` and open them as a new document in `registry`.
///
/// The id is generated from `name`, the byte length and `modified_ms`,
/// so reopening the same file returns the existing document.
///
/// # Errors
///
/// Returns the [`ValidationError`] raised by [`decode`].
pub fn open_document<'r>(
    registry: &'r mut DocumentRegistry,
    name: &str,
    bytes: &[u8],
    declared_mime: &str,
    modified_ms: u64,
) -> Result<&'r mut DocumentContext, ValidationError> {
    let buffer = decode(bytes, declared_mime, registry.config())?;
    let id = DocumentId::generate(name, bytes.len(), modified_ms);
    Ok(registry.create_context(id, name, buffer))
}

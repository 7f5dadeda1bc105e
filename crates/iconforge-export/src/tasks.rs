//! Task execution shared by the worker thread and the synchronous
//! fallback, so both paths produce the same output for the same task.

use iconforge_pipeline::{Dimensions, PixelBuffer, ValidationError};
use image::imageops::FilterType;

use crate::bundle::render_bundle;
use crate::codec::{OutputFormat, encode_into};
use crate::error::ExportError;
use crate::naming::{converted_name, file_stem, sanitize_file_name};
use crate::protocol::{
    BatchItem, CompressJob, EncodedImage, Progress, ResizeJob, TaskFailure, TaskOutput, WorkerTask,
};
use crate::scratch::ScratchPool;

/// Dimensions that fit `dimensions` inside a `max_side` square,
/// preserving the aspect ratio. Smaller images are left alone.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn fit_within(dimensions: Dimensions, max_side: u32) -> Dimensions {
    let longest = dimensions.width.max(dimensions.height);
    if max_side == 0 || longest <= max_side {
        return dimensions;
    }
    let ratio = f64::from(max_side) / f64::from(longest);
    let axis = |side: u32| ((f64::from(side) * ratio).round() as u32).clamp(1, max_side);
    Dimensions::new(axis(dimensions.width), axis(dimensions.height))
}

fn encode_image(
    name: String,
    buffer: &PixelBuffer,
    format: OutputFormat,
    quality: Option<u8>,
    pool: &ScratchPool,
) -> Result<EncodedImage, ExportError> {
    let mut scratch = pool.acquire();
    encode_into(buffer, format, quality, &mut scratch)?;
    Ok(EncodedImage {
        name,
        format,
        dimensions: buffer.dimensions(),
        bytes: scratch.to_vec(),
    })
}

/// Downscale to fit the job's bound, if any, and encode.
///
/// # Errors
///
/// Returns [`ExportError::Codec`] if encoding fails.
pub fn compress(job: &CompressJob, pool: &ScratchPool) -> Result<EncodedImage, ExportError> {
    let target = job
        .max_width_or_height
        .map_or(job.buffer.dimensions(), |max| fit_within(job.buffer.dimensions(), max));
    let name = converted_name(&job.name, job.format);
    if target == job.buffer.dimensions() {
        return encode_image(name, &job.buffer, job.format, job.quality, pool);
    }
    let resized = job
        .buffer
        .resized(target.width, target.height, FilterType::Lanczos3)
        .map_err(ValidationError::from)?;
    tracing::debug!(from = %job.buffer.dimensions(), to = %target, "downscaled for compression");
    encode_image(name, &resized, job.format, job.quality, pool)
}

/// Resample to an exact size and encode as PNG.
///
/// # Errors
///
/// Returns [`ExportError::Validation`] for a zero target size and
/// [`ExportError::Codec`] if encoding fails.
pub fn resize(job: &ResizeJob, pool: &ScratchPool) -> Result<EncodedImage, ExportError> {
    let Dimensions { width, height } = job.size;
    let resized = job
        .buffer
        .resized(width, height, FilterType::Lanczos3)
        .map_err(ValidationError::from)?;
    let name = sanitize_file_name(&format!("{}_{}.png", file_stem(&job.name), job.size));
    encode_image(name, &resized, OutputFormat::Png, None, pool)
}

/// Compress every item, calling `progress` after each one.
///
/// Item failures are recorded in place; the batch always yields one
/// [`BatchItem`] per input.
pub fn batch_compress(
    items: &[CompressJob],
    pool: &ScratchPool,
    progress: &mut dyn FnMut(Progress),
) -> Vec<BatchItem> {
    let total = items.len();
    items
        .iter()
        .enumerate()
        .map(|(index, job)| {
            let outcome = compress(job, pool).map_err(|e| {
                tracing::warn!(index, name = %job.name, error = %e, "batch item failed");
                TaskFailure::from(&e)
            });
            progress(Progress::after(index, total));
            BatchItem {
                index,
                name: job.name.clone(),
                outcome,
            }
        })
        .collect()
}

/// Run any task to completion on the current thread.
///
/// # Errors
///
/// Returns the task's [`ExportError`]. Batches never fail as a whole.
pub fn run_task(
    task: &WorkerTask,
    pool: &ScratchPool,
    progress: &mut dyn FnMut(Progress),
) -> Result<TaskOutput, ExportError> {
    match task {
        WorkerTask::Compress(job) => compress(job, pool).map(TaskOutput::Encoded),
        WorkerTask::Resize(job) => resize(job, pool).map(TaskOutput::Encoded),
        WorkerTask::CreateMultiSize(job) => {
            render_bundle(&job.name, &job.buffer, &job.sizes, &job.hidden_sizes, pool)
                .map(TaskOutput::Bundle)
        }
        WorkerTask::BatchCompress(job) => {
            Ok(TaskOutput::Batch(batch_compress(&job.items, pool, progress)))
        }
    }
}

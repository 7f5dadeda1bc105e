//! Multi-size icon bundles.
//!
//! Every size is resampled from the original pixels, never from a
//! smaller rendition, so small icons do not accumulate resampling blur.
//! Hidden base sizes are always rendered but never emitted.

use iconforge_pipeline::{PixelBuffer, ValidationError};
use image::imageops::FilterType;

use crate::codec::{OutputFormat, encode_into};
use crate::config::ExportConfig;
use crate::error::{ExportError, ExportSizeError};
use crate::naming::bundle_entry_name;
use crate::protocol::{Bundle, BundleEntry};
use crate::scratch::ScratchPool;

/// Sorted, deduplicated union of `hidden` and `requested`.
#[must_use]
pub fn all_sizes(requested: &[u32], hidden: &[u32]) -> Vec<u32> {
    let mut sizes: Vec<u32> = hidden.iter().chain(requested).copied().collect();
    sizes.sort_unstable();
    sizes.dedup();
    sizes
}

/// Validate a request and return every size to render.
///
/// An empty request means [`ExportConfig::default_sizes`].
///
/// # Errors
///
/// Returns [`ValidationError::InvalidParameter`] if any size falls
/// outside `1..=max_bundle_size`.
pub fn plan_sizes(requested: &[u32], config: &ExportConfig) -> Result<Vec<u32>, ValidationError> {
    let requested = if requested.is_empty() {
        config.default_sizes.as_slice()
    } else {
        requested
    };
    config.check_bundle_sizes(requested)?;
    config.check_bundle_sizes(&config.hidden_sizes)?;
    Ok(all_sizes(requested, &config.hidden_sizes))
}

fn render_size(
    original: &PixelBuffer,
    size: u32,
    scratch: &mut Vec<u8>,
) -> Result<(), ExportSizeError> {
    let fail = |cause: &dyn std::fmt::Display| ExportSizeError {
        size,
        cause: cause.to_string(),
    };
    let resized = original
        .resized(size, size, FilterType::Lanczos3)
        .map_err(|e| fail(&e))?;
    encode_into(&resized, OutputFormat::Ico, None, scratch).map_err(|e| fail(&e))
}

/// Render one ICO per entry of `sizes` from `original`.
///
/// Per-size failures are logged and collected; the remaining sizes
/// still render.
///
/// # Errors
///
/// Returns [`ExportError::EmptyBundle`] when no visible entry could be
/// produced.
pub fn render_bundle(
    name: &str,
    original: &PixelBuffer,
    sizes: &[u32],
    hidden: &[u32],
    pool: &ScratchPool,
) -> Result<Bundle, ExportError> {
    let mut entries = Vec::new();
    let mut generated = Vec::new();
    let mut failures = Vec::new();

    for &size in sizes {
        let mut scratch = pool.acquire();
        match render_size(original, size, &mut scratch) {
            Ok(()) => {
                generated.push(size);
                if !hidden.contains(&size) {
                    entries.push(BundleEntry {
                        size,
                        name: bundle_entry_name(name, size),
                        bytes: scratch.to_vec(),
                    });
                }
            }
            Err(e) => {
                tracing::warn!(size, cause = %e.cause, "bundle size failed");
                failures.push(e);
            }
        }
    }

    if entries.is_empty() {
        return Err(ExportError::EmptyBundle { failures });
    }
    tracing::info!(
        name,
        visible = entries.len(),
        generated = generated.len(),
        failed = failures.len(),
        "rendered icon bundle"
    );
    Ok(Bundle {
        entries,
        generated,
        failures,
    })
}

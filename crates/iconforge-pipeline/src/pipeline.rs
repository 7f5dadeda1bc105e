//! Ordered, fail-soft filter application.
//!
//! A [`FilterPipeline`] owns an ordered list of filters, each with an
//! enabled flag. A recompute always starts from the untouched original
//! buffer and walks the enabled filters in order:
//!
//! ```rust
//! # use iconforge_pipeline::{FilterPipeline, PixelBuffer, PixelBufferError};
//! # fn run() -> Result<(), PixelBufferError> {
//! let mut pipeline = FilterPipeline::with_defaults();
//! pipeline.enable("square");
//! pipeline.enable("resolution");
//!
//! let original = PixelBuffer::filled(100, 60, [200, 10, 10, 255])?;
//! let mut recompute = pipeline.begin(&original).expect("pipeline idle");
//! while let Some(step) = recompute.step() {
//!     // The host may do other work between steps.
//!     let _ = step;
//! }
//! let report = recompute.finish();
//! assert_eq!(report.output.dimensions().to_string(), "30x30");
//! # Ok(())
//! # }
//! ```
//!
//! [`FilterPipeline::begin`] holds a processing flag for as long as the
//! returned [`Recompute`] lives. A second recompute requested while one
//! is in flight is dropped with a warning, never queued. A filter that
//! fails is logged and skipped; the chain continues with the buffer as
//! it was before that filter.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::config::ScaleBounds;
use crate::filter::{Filter, FilterError, FilterFingerprint, FilterKind, FilterState, FilterValue};
use crate::types::Dimensions;

/// A reorder request that is not a permutation of the current filter
/// names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReorderError {
    /// The request names a different number of filters.
    #[error("order names {actual} filters, pipeline has {expected}")]
    LengthMismatch {
        /// Filters in the pipeline.
        expected: usize,
        /// Names in the request.
        actual: usize,
    },

    /// The request names a filter the pipeline does not have.
    #[error("unknown filter '{0}'")]
    UnknownFilter(String),

    /// The request names a filter twice.
    #[error("filter '{0}' listed more than once")]
    Duplicate(String),
}

/// One filter and whether it takes part in recomputes.
#[derive(Debug, Clone, PartialEq)]
struct FilterSlot<F> {
    filter: F,
    enabled: bool,
}

/// Serializable pipeline state: order plus every filter's enabled flag
/// and parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    /// Filter names in application order.
    pub order: Vec<String>,
    /// Per-filter state keyed by name.
    pub filters: FilterFingerprint,
}

/// Counts describing a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Registered filters.
    pub total: usize,
    /// Enabled filters.
    pub active: usize,
    /// Disabled filters.
    pub inactive: usize,
    /// Whether a recompute is in flight.
    pub processing: bool,
    /// Filter names in application order.
    pub order: Vec<String>,
}

/// What happened to each enabled filter during one recompute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Filters that ran successfully, in order (including no-ops).
    pub applied: Vec<String>,
    /// Filters that failed; their input was passed through.
    pub failures: Vec<FilterError>,
    /// The request was dropped because a recompute was already in
    /// flight, so the output is the unmodified original.
    pub skipped_busy: bool,
}

/// Output buffer plus summary of one recompute.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// The recomputed buffer.
    pub output: PixelBuffer,
    /// Per-filter outcome.
    pub summary: RunSummary,
}

/// Result of a single [`Recompute::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The filter produced a new buffer.
    Applied {
        /// Filter name.
        filter: String,
        /// Dimensions after the filter.
        dimensions: Dimensions,
    },
    /// The filter was a no-op for this input.
    Unchanged {
        /// Filter name.
        filter: String,
    },
    /// The filter failed; the buffer is unchanged.
    Failed(FilterError),
}

/// Holds the processing flag; clears it on drop.
#[derive(Debug)]
struct ProcessingGuard<'p> {
    flag: &'p AtomicBool,
}

impl<'p> ProcessingGuard<'p> {
    fn acquire(flag: &'p AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// An ordered sequence of named filters.
#[derive(Debug)]
pub struct FilterPipeline<F = FilterKind> {
    slots: Vec<FilterSlot<F>>,
    processing: AtomicBool,
}

impl<F> Default for FilterPipeline<F> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            processing: AtomicBool::new(false),
        }
    }
}

impl<F: Clone> Clone for FilterPipeline<F> {
    /// Clones filters and flags. The clone starts idle.
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            processing: AtomicBool::new(false),
        }
    }
}

impl FilterPipeline<FilterKind> {
    /// Every built-in filter, disabled, in registration order.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::with_scale_bounds(ScaleBounds::default())
    }

    /// Like [`with_defaults`](Self::with_defaults) with custom bounds for
    /// the resolution filter.
    #[must_use]
    pub fn with_scale_bounds(bounds: ScaleBounds) -> Self {
        let mut pipeline = Self::default();
        for filter in FilterKind::defaults_with(bounds) {
            pipeline.register(filter);
        }
        pipeline
    }
}

impl<F: Filter> FilterPipeline<F> {
    /// An empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter (disabled) at the end of the order.
    ///
    /// A filter with the same name is replaced in place, keeping its
    /// position; the replaced filter is returned.
    pub fn register(&mut self, filter: F) -> Option<F> {
        let slot = FilterSlot {
            filter,
            enabled: false,
        };
        if let Some(index) = self.position(slot.filter.name()) {
            tracing::debug!(filter = slot.filter.name(), "replacing registered filter");
            let old = std::mem::replace(&mut self.slots[index], slot);
            return Some(old.filter);
        }
        self.slots.push(slot);
        None
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.filter.name() == name)
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut FilterSlot<F>> {
        self.slots.iter_mut().find(|s| s.filter.name() == name)
    }

    /// Number of registered filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no filter is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Look up a filter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&F> {
        self.slots
            .iter()
            .find(|s| s.filter.name() == name)
            .map(|s| &s.filter)
    }

    /// Mutable lookup by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut F> {
        self.slot_mut(name).map(|s| &mut s.filter)
    }

    /// Whether the named filter is enabled (`None` if unknown).
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.slots
            .iter()
            .find(|s| s.filter.name() == name)
            .map(|s| s.enabled)
    }

    /// Set the enabled flag. Returns `false` for an unknown name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        if let Some(slot) = self.slot_mut(name) {
            slot.enabled = enabled;
            true
        } else {
            tracing::warn!(filter = name, "unknown filter");
            false
        }
    }

    /// Enable the named filter.
    pub fn enable(&mut self, name: &str) -> bool {
        self.set_enabled(name, true)
    }

    /// Disable the named filter.
    pub fn disable(&mut self, name: &str) -> bool {
        self.set_enabled(name, false)
    }

    /// Flip the enabled flag; returns the new state (`None` if unknown).
    pub fn toggle(&mut self, name: &str) -> Option<bool> {
        let Some(slot) = self.slot_mut(name) else {
            tracing::warn!(filter = name, "unknown filter");
            return None;
        };
        slot.enabled = !slot.enabled;
        Some(slot.enabled)
    }

    /// Enable every filter.
    pub fn enable_all(&mut self) {
        for slot in &mut self.slots {
            slot.enabled = true;
        }
    }

    /// Disable every filter.
    pub fn disable_all(&mut self) {
        for slot in &mut self.slots {
            slot.enabled = false;
        }
    }

    /// Restore default parameters on every filter and disable them all.
    /// The order is kept.
    pub fn reset_all(&mut self) {
        for slot in &mut self.slots {
            slot.filter.reset();
            slot.enabled = false;
        }
    }

    /// Replace the named filter's parameters. Returns `false` for an
    /// unknown name or a value of the wrong shape.
    pub fn configure(&mut self, name: &str, value: FilterValue) -> bool {
        match self.get_mut(name) {
            Some(filter) => filter.configure(value),
            None => {
                tracing::warn!(filter = name, "unknown filter");
                false
            }
        }
    }

    /// Filter names in application order.
    #[must_use]
    pub fn order(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.filter.name().to_owned()).collect()
    }

    /// Validate `order` as a permutation of the current filter names.
    ///
    /// # Errors
    ///
    /// Returns the first reason `order` is not a permutation.
    pub fn validate_order<S: AsRef<str>>(&self, order: &[S]) -> Result<(), ReorderError> {
        if order.len() != self.slots.len() {
            return Err(ReorderError::LengthMismatch {
                expected: self.slots.len(),
                actual: order.len(),
            });
        }
        let mut seen = HashSet::with_capacity(order.len());
        for name in order {
            let name = name.as_ref();
            if self.position(name).is_none() {
                return Err(ReorderError::UnknownFilter(name.to_owned()));
            }
            if !seen.insert(name) {
                return Err(ReorderError::Duplicate(name.to_owned()));
            }
        }
        Ok(())
    }

    /// Change the application order.
    ///
    /// # Errors
    ///
    /// Returns [`ReorderError`] (and keeps the previous order) unless
    /// `order` is a permutation of the current filter names.
    pub fn reorder<S: AsRef<str>>(&mut self, order: &[S]) -> Result<(), ReorderError> {
        if let Err(e) = self.validate_order(order) {
            tracing::warn!(error = %e, "reorder rejected, keeping previous order");
            return Err(e);
        }
        let mut remaining: Vec<Option<FilterSlot<F>>> =
            std::mem::take(&mut self.slots).into_iter().map(Some).collect();
        for name in order {
            let name = name.as_ref();
            if let Some(slot) = remaining
                .iter_mut()
                .find(|s| s.as_ref().is_some_and(|s| s.filter.name() == name))
                .and_then(Option::take)
            {
                self.slots.push(slot);
            }
        }
        Ok(())
    }

    /// Names of enabled filters, in order.
    #[must_use]
    pub fn active_filters(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.filter.name().to_owned())
            .collect()
    }

    /// Whether any filter is enabled.
    #[must_use]
    pub fn has_active_filters(&self) -> bool {
        self.slots.iter().any(|s| s.enabled)
    }

    /// `{name: {enabled, value}}` for every filter.
    #[must_use]
    pub fn fingerprint(&self) -> FilterFingerprint {
        FilterFingerprint(
            self.slots
                .iter()
                .map(|s| {
                    (
                        s.filter.name().to_owned(),
                        FilterState {
                            enabled: s.enabled,
                            value: s.filter.value(),
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>(),
        )
    }

    /// Export order and per-filter state.
    #[must_use]
    pub fn export_config(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            order: self.order(),
            filters: self.fingerprint(),
        }
    }

    /// Apply a previously exported state.
    ///
    /// Known filters take the snapshot's enabled flag and parameters;
    /// unknown names are logged and ignored. The order is applied only
    /// if it is a valid permutation.
    pub fn import_config(&mut self, snapshot: &PipelineSnapshot) {
        for (name, state) in &snapshot.filters.0 {
            match self.slot_mut(name) {
                Some(slot) => {
                    slot.enabled = state.enabled;
                    slot.filter.configure(state.value);
                }
                None => tracing::warn!(filter = %name, "imported state names unknown filter"),
            }
        }
        // A rejected order is already logged by `reorder`.
        let _ = self.reorder(&snapshot.order);
    }

    /// Counts and order.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        let active = self.slots.iter().filter(|s| s.enabled).count();
        PipelineStats {
            total: self.slots.len(),
            active,
            inactive: self.slots.len() - active,
            processing: self.is_processing(),
            order: self.order(),
        }
    }

    /// Whether a recompute is in flight.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Start a step-wise recompute from `original`.
    ///
    /// Returns `None` (and logs a warning) if a recompute is already in
    /// flight. The processing flag stays set until the returned
    /// [`Recompute`] is finished or dropped.
    #[must_use]
    pub fn begin(&self, original: &PixelBuffer) -> Option<Recompute<'_, F>> {
        let Some(guard) = ProcessingGuard::acquire(&self.processing) else {
            tracing::warn!("pipeline already processing, ignoring recompute request");
            return None;
        };
        tracing::debug!(
            dimensions = %original.dimensions(),
            active = ?self.active_filters(),
            "recompute started"
        );
        Some(Recompute {
            slots: &self.slots,
            _guard: guard,
            current: original.clone(),
            next: 0,
            summary: RunSummary::default(),
        })
    }

    /// Recompute from `original` in one go.
    ///
    /// If a recompute is already in flight, the original is returned
    /// unchanged with [`RunSummary::skipped_busy`] set.
    #[must_use]
    pub fn run(&self, original: &PixelBuffer) -> PipelineReport {
        self.begin(original).map_or_else(
            || PipelineReport {
                output: original.clone(),
                summary: RunSummary {
                    skipped_busy: true,
                    ..RunSummary::default()
                },
            },
            Recompute::finish,
        )
    }

    /// Recompute from `original` and return only the output buffer.
    #[must_use]
    pub fn apply_all(&self, original: &PixelBuffer) -> PixelBuffer {
        self.run(original).output
    }
}

/// A recompute in progress. Each [`step`](Self::step) applies exactly
/// one enabled filter.
#[must_use = "a recompute does nothing until stepped or finished"]
#[derive(Debug)]
pub struct Recompute<'p, F> {
    slots: &'p [FilterSlot<F>],
    _guard: ProcessingGuard<'p>,
    current: PixelBuffer,
    next: usize,
    summary: RunSummary,
}

impl<F: Filter> Recompute<'_, F> {
    /// The buffer as of the last completed step.
    #[must_use]
    pub const fn current(&self) -> &PixelBuffer {
        &self.current
    }

    /// Whether every enabled filter has been visited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.slots[self.next.min(self.slots.len())..]
            .iter()
            .all(|s| !s.enabled)
    }

    /// Apply the next enabled filter. Returns `None` when none remain.
    pub fn step(&mut self) -> Option<StepOutcome> {
        let slots = self.slots;
        let offset = slots.get(self.next..)?.iter().position(|s| s.enabled)?;
        let slot = &slots[self.next + offset];
        self.next += offset + 1;

        let name = slot.filter.name().to_owned();
        let before = self.current.dimensions();
        let result = slot.filter.apply(&self.current).map(|out| match out {
            Cow::Owned(buffer) => Some(buffer),
            Cow::Borrowed(_) => None,
        });

        let outcome = match result {
            Ok(Some(buffer)) => {
                let dimensions = buffer.dimensions();
                tracing::debug!(filter = %name, from = %before, to = %dimensions, "filter applied");
                self.current = buffer;
                self.summary.applied.push(name.clone());
                StepOutcome::Applied {
                    filter: name,
                    dimensions,
                }
            }
            Ok(None) => {
                tracing::debug!(filter = %name, dimensions = %before, "filter was a no-op");
                self.summary.applied.push(name.clone());
                StepOutcome::Unchanged { filter: name }
            }
            Err(e) => {
                tracing::warn!(error = %e, "filter failed, continuing with its input");
                self.summary.failures.push(e.clone());
                StepOutcome::Failed(e)
            }
        };
        Some(outcome)
    }

    /// Run the remaining steps and release the processing flag.
    pub fn finish(mut self) -> PipelineReport {
        while self.step().is_some() {}
        if !self.summary.failures.is_empty() {
            let failed: Vec<&str> = self
                .summary
                .failures
                .iter()
                .map(|e| e.filter.as_str())
                .collect();
            tracing::warn!(?failed, "recompute finished with failed filters");
        }
        tracing::debug!(dimensions = %self.current.dimensions(), "recompute finished");
        PipelineReport {
            output: self.current,
            summary: self.summary,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::square::CropAnchor;

    /// A pipeline filter that can be told to fail.
    #[derive(Debug, Clone)]
    enum TestFilter {
        Real(FilterKind),
        Broken(&'static str),
        Tag(&'static str, u8),
    }

    impl Filter for TestFilter {
        fn name(&self) -> &str {
            match self {
                Self::Real(f) => f.name(),
                Self::Broken(name) | Self::Tag(name, _) => *name,
            }
        }

        fn value(&self) -> FilterValue {
            match self {
                Self::Real(f) => f.value(),
                Self::Broken(_) => FilterValue::Intensity { intensity: 0.0 },
                Self::Tag(_, v) => FilterValue::Intensity {
                    intensity: f64::from(*v),
                },
            }
        }

        fn apply<'a>(
            &self,
            source: &'a PixelBuffer,
        ) -> Result<Cow<'a, PixelBuffer>, FilterError> {
            match self {
                Self::Real(f) => f.apply(source),
                Self::Broken(name) => Err(FilterError::new(*name, "simulated fault")),
                // Overwrite the blue channel so application order is visible.
                Self::Tag(_, v) => {
                    let v = *v;
                    Ok(Cow::Owned(source.map_pixels(|[r, g, _, a]| [r, g, v, a])))
                }
            }
        }

        fn configure(&mut self, value: FilterValue) -> bool {
            match self {
                Self::Real(f) => f.configure(value),
                _ => false,
            }
        }

        fn reset(&mut self) {
            if let Self::Real(f) = self {
                f.reset();
            }
        }
    }

    #[expect(clippy::cast_possible_truncation)]
    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let image = image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x * 2) as u8, (y * 3) as u8, 40, 255])
        });
        PixelBuffer::from_image(image).unwrap()
    }

    #[test]
    fn defaults_are_registered_disabled() {
        let pipeline = FilterPipeline::with_defaults();
        assert_eq!(pipeline.order(), ["square", "grayscale", "resolution"]);
        assert!(!pipeline.has_active_filters());
        assert_eq!(pipeline.stats().inactive, 3);
    }

    #[test]
    fn all_disabled_is_identity() {
        let pipeline = FilterPipeline::with_defaults();
        let buf = gradient(37, 21);
        assert_eq!(pipeline.apply_all(&buf), buf);
    }

    #[test]
    fn crop_then_scale_scenario() {
        let mut pipeline = FilterPipeline::with_defaults();
        pipeline.enable("square");
        pipeline.enable("resolution");
        let report = pipeline.run(&gradient(100, 60));
        assert_eq!(report.output.dimensions(), Dimensions::new(30, 30));
        assert_eq!(report.summary.applied, ["square", "resolution"]);
        assert!(report.summary.failures.is_empty());
    }

    #[test]
    fn failing_filter_is_skipped_and_chain_continues() {
        let mut pipeline = FilterPipeline::new();
        pipeline.register(TestFilter::Broken("broken"));
        pipeline.register(TestFilter::Real(FilterKind::Grayscale(
            crate::grayscale::Grayscale::default(),
        )));
        pipeline.enable_all();

        let buf = gradient(10, 10);
        let report = pipeline.run(&buf);
        assert_eq!(report.summary.failures.len(), 1);
        assert_eq!(report.summary.failures[0].filter, "broken");
        assert_eq!(report.summary.applied, ["grayscale"]);
        let [r, g, b, _] = report.output.pixel(3, 3).unwrap();
        assert_eq!((r, g), (g, b), "grayscale still ran");
        assert!(!pipeline.is_processing());
    }

    #[test]
    fn order_is_respected() {
        let mut pipeline = FilterPipeline::new();
        pipeline.register(TestFilter::Tag("a", 1));
        pipeline.register(TestFilter::Tag("b", 2));
        pipeline.enable_all();
        let buf = gradient(2, 2);
        assert_eq!(pipeline.apply_all(&buf).pixel(0, 0).unwrap()[2], 2);

        pipeline.reorder(&["b", "a"]).unwrap();
        assert_eq!(pipeline.apply_all(&buf).pixel(0, 0).unwrap()[2], 1);
    }

    #[test]
    fn reorder_rejects_non_permutations() {
        let mut pipeline = FilterPipeline::with_defaults();
        let before = pipeline.order();

        assert_eq!(
            pipeline.reorder(&["square", "grayscale"]),
            Err(ReorderError::LengthMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(
            pipeline.reorder(&["square", "grayscale", "blur"]),
            Err(ReorderError::UnknownFilter("blur".to_owned()))
        );
        assert_eq!(
            pipeline.reorder(&["square", "square", "grayscale"]),
            Err(ReorderError::Duplicate("square".to_owned()))
        );
        assert_eq!(pipeline.order(), before);

        pipeline
            .reorder(&["resolution", "square", "grayscale"])
            .unwrap();
        assert_eq!(pipeline.order(), ["resolution", "square", "grayscale"]);
    }

    #[test]
    fn busy_pipeline_returns_original() {
        let mut pipeline = FilterPipeline::with_defaults();
        pipeline.enable("square");
        let buf = gradient(20, 10);

        let recompute = pipeline.begin(&buf).expect("idle");
        assert!(pipeline.is_processing());
        assert!(pipeline.begin(&buf).is_none());

        let report = pipeline.run(&buf);
        assert!(report.summary.skipped_busy);
        assert_eq!(report.output, buf);

        let finished = recompute.finish();
        assert_eq!(finished.output.dimensions(), Dimensions::new(10, 10));
        assert!(!pipeline.is_processing());
    }

    #[test]
    fn dropping_recompute_clears_processing_flag() {
        let mut pipeline = FilterPipeline::with_defaults();
        pipeline.enable_all();
        let buf = gradient(8, 4);
        {
            let mut recompute = pipeline.begin(&buf).expect("idle");
            let _ = recompute.step();
        }
        assert!(!pipeline.is_processing());
        assert!(pipeline.begin(&buf).is_some());
    }

    #[test]
    fn steps_apply_one_filter_each() {
        let mut pipeline = FilterPipeline::with_defaults();
        pipeline.enable("square");
        pipeline.enable("resolution");
        let buf = gradient(100, 60);
        let mut recompute = pipeline.begin(&buf).expect("idle");

        assert_eq!(
            recompute.step(),
            Some(StepOutcome::Applied {
                filter: "square".to_owned(),
                dimensions: Dimensions::new(60, 60)
            })
        );
        assert!(!recompute.is_finished());
        assert_eq!(recompute.current().dimensions(), Dimensions::new(60, 60));
        assert_eq!(
            recompute.step(),
            Some(StepOutcome::Applied {
                filter: "resolution".to_owned(),
                dimensions: Dimensions::new(30, 30)
            })
        );
        assert!(recompute.is_finished());
        assert_eq!(recompute.step(), None);
    }

    #[test]
    fn noop_filter_reports_unchanged() {
        let mut pipeline = FilterPipeline::with_defaults();
        pipeline.enable("square");
        let buf = gradient(5, 5);
        let mut recompute = pipeline.begin(&buf).expect("idle");
        assert_eq!(
            recompute.step(),
            Some(StepOutcome::Unchanged {
                filter: "square".to_owned()
            })
        );
    }

    #[test]
    fn toggle_and_bulk_flags() {
        let mut pipeline = FilterPipeline::with_defaults();
        assert_eq!(pipeline.toggle("grayscale"), Some(true));
        assert_eq!(pipeline.active_filters(), ["grayscale"]);
        assert_eq!(pipeline.toggle("grayscale"), Some(false));
        assert_eq!(pipeline.toggle("nope"), None);

        pipeline.enable_all();
        assert_eq!(pipeline.stats().active, 3);
        pipeline.disable_all();
        assert!(!pipeline.has_active_filters());
    }

    #[test]
    fn reset_all_restores_defaults_and_disables() {
        let mut pipeline = FilterPipeline::with_defaults();
        pipeline.enable_all();
        pipeline.configure(
            "square",
            FilterValue::Anchor {
                anchor: CropAnchor::Left,
            },
        );
        pipeline.reset_all();
        assert!(!pipeline.has_active_filters());
        assert_eq!(
            pipeline.get("square").map(Filter::value),
            Some(FilterValue::Anchor {
                anchor: CropAnchor::Center
            })
        );
    }

    #[test]
    fn register_replaces_in_place() {
        let mut pipeline = FilterPipeline::new();
        pipeline.register(TestFilter::Tag("a", 1));
        pipeline.register(TestFilter::Tag("b", 2));
        pipeline.enable("a");
        let old = pipeline.register(TestFilter::Tag("a", 9));
        assert!(matches!(old, Some(TestFilter::Tag("a", 1))));
        assert_eq!(pipeline.order(), ["a", "b"]);
        assert_eq!(pipeline.is_enabled("a"), Some(false));
    }

    #[test]
    fn config_export_and_import() {
        let mut source = FilterPipeline::with_defaults();
        source.enable("grayscale");
        source.configure("grayscale", FilterValue::Intensity { intensity: 0.3 });
        source
            .reorder(&["grayscale", "resolution", "square"])
            .unwrap();
        let snapshot = source.export_config();

        let json = serde_json::to_string(&snapshot).unwrap();
        let snapshot: PipelineSnapshot = serde_json::from_str(&json).unwrap();

        let mut target = FilterPipeline::with_defaults();
        target.import_config(&snapshot);
        assert_eq!(target.order(), ["grayscale", "resolution", "square"]);
        assert_eq!(target.fingerprint(), source.fingerprint());
    }

    #[test]
    fn fingerprint_tracks_flags_and_values() {
        let mut pipeline = FilterPipeline::with_defaults();
        let before = pipeline.fingerprint();
        pipeline.enable("square");
        assert_ne!(pipeline.fingerprint(), before);
        pipeline.disable("square");
        assert_eq!(pipeline.fingerprint(), before);
        pipeline.configure(
            "resolution",
            FilterValue::Scale {
                factor: 0.7,
                quality: crate::resolution::ResampleQuality::Low,
            },
        );
        assert_ne!(pipeline.fingerprint(), before);
    }

    #[test]
    fn clone_starts_idle() {
        let pipeline = FilterPipeline::with_defaults();
        let buf = gradient(4, 4);
        let _recompute = pipeline.begin(&buf).expect("idle");
        let copy = pipeline.clone();
        assert!(!copy.is_processing());
    }
}

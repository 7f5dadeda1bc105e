//! Debounced change detection between successive recomputes.
//!
//! [`ChangeDetector`] decides whether a freshly recomputed buffer
//! differs enough from the last one to be worth redrawing. Requests are
//! coalesced by a [`Debouncer`]: only the last request in a burst is
//! evaluated once the quiet period has elapsed. Time is passed in
//! explicitly, so the state machine has no platform timers.
//!
//! The pixel comparison looks at roughly 2 500 evenly strided pixels
//! (10 000 channel values), not every pixel. A small edit that falls
//! between sample points is not reported. This is a known approximation traded for constant
//! comparison cost.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::buffer::{CHANNELS, PixelBuffer};
use crate::config::ChangeDetectionConfig;
use crate::filter::FilterFingerprint;
use crate::types::{Dimensions, Rgba};

/// Channel values per buffer the sample stride is derived from. With
/// four channels per pixel this samples about 2 500 pixels.
pub const SAMPLE_BUDGET: usize = 10_000;

/// A cancellable one-shot timer carrying the most recent value.
///
/// Arming while already armed replaces the value and restarts the
/// window.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    /// An unarmed debouncer with the given quiet period.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Quiet period.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Change the quiet period. An armed deadline is not moved.
    pub const fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    /// Arm (or re-arm) with `value`, firing `window` after `now`.
    /// Returns the value it replaced, if any.
    pub fn arm(&mut self, value: T, now: Instant) -> Option<T> {
        let deadline = now + self.window;
        self.pending
            .replace((value, deadline))
            .map(|(previous, _)| previous)
    }

    /// Disarm and return the pending value.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    /// Fire if the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if self.deadline().is_some_and(|deadline| now >= deadline) {
            self.cancel()
        } else {
            None
        }
    }

    /// Whether a value is waiting.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending value fires.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }
}

/// What the detector compares: dimensions, filter state and a sparse
/// pixel sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSnapshot {
    /// Buffer dimensions.
    pub dimensions: Dimensions,
    /// Every filter's enabled flag and parameters.
    pub fingerprint: FilterFingerprint,
    /// Strided pixel sample; empty when sampling is disabled.
    pub samples: Vec<Rgba>,
}

impl ChangeSnapshot {
    /// Capture a snapshot of `buffer`.
    #[must_use]
    pub fn capture(buffer: &PixelBuffer, fingerprint: FilterFingerprint, sample: bool) -> Self {
        Self {
            dimensions: buffer.dimensions(),
            fingerprint,
            samples: if sample {
                sample_pixels(buffer.pixels())
            } else {
                Vec::new()
            },
        }
    }
}

/// Pixel stride for a raster of `byte_len` bytes: one pixel in every
/// `byte_len / SAMPLE_BUDGET`, so about [`SAMPLE_BUDGET`] / 4 samples.
#[must_use]
pub const fn sample_stride(byte_len: usize) -> usize {
    let stride = byte_len / SAMPLE_BUDGET;
    if stride == 0 { 1 } else { stride }
}

/// Every `stride`-th pixel of an RGBA byte slice.
#[must_use]
pub fn sample_pixels(bytes: &[u8]) -> Vec<Rgba> {
    bytes
        .chunks_exact(CHANNELS)
        .step_by(sample_stride(bytes.len()))
        .map(|px| [px[0], px[1], px[2], px[3]])
        .collect()
}

/// Why a comparison reported a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeReason {
    /// Dimensions moved by more than the tolerance.
    Dimensions {
        /// Previous dimensions.
        previous: Dimensions,
        /// New dimensions.
        current: Dimensions,
    },
    /// A filter was toggled, reconfigured, added or removed.
    Filter(String),
    /// A sampled pixel differs by more than the tolerance.
    Pixels {
        /// Index of the first differing sample.
        sample: usize,
    },
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeVerdict {
    /// First evaluation: the snapshot was recorded, no change reported.
    Baseline,
    /// Nothing material changed.
    Unchanged,
    /// Something changed.
    Changed(ChangeReason),
}

impl ChangeVerdict {
    /// Whether downstream should redraw.
    #[must_use]
    pub const fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

/// Observable detector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// No evaluation pending.
    Idle,
    /// A request is waiting for the debounce window to elapse.
    Pending {
        /// When it will be evaluated.
        deadline: Instant,
    },
}

/// Debounced comparator for one document.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    config: ChangeDetectionConfig,
    previous: Option<ChangeSnapshot>,
    debouncer: Debouncer<ChangeSnapshot>,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(ChangeDetectionConfig::default())
    }
}

impl ChangeDetector {
    /// A detector with no baseline.
    #[must_use]
    pub const fn new(config: ChangeDetectionConfig) -> Self {
        let window = config.debounce;
        Self {
            config,
            previous: None,
            debouncer: Debouncer::new(window),
        }
    }

    /// Current tuning.
    #[must_use]
    pub const fn config(&self) -> &ChangeDetectionConfig {
        &self.config
    }

    /// Replace the tuning. A pending request keeps its deadline.
    pub fn configure(&mut self, config: ChangeDetectionConfig) {
        self.debouncer.set_window(config.debounce);
        self.config = config;
    }

    /// Queue a comparison of `buffer` against the last evaluated state.
    ///
    /// Restarts the debounce window; an earlier request still waiting is
    /// discarded. Call [`poll`](Self::poll) to obtain the verdict.
    pub fn detect_changes(
        &mut self,
        buffer: &PixelBuffer,
        fingerprint: FilterFingerprint,
        now: Instant,
    ) {
        let snapshot = ChangeSnapshot::capture(buffer, fingerprint, self.config.pixel_sampling);
        if self.debouncer.arm(snapshot, now).is_some() {
            tracing::debug!("change check coalesced into newer request");
        }
    }

    /// Evaluate the pending request if its window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<ChangeVerdict> {
        let snapshot = self.debouncer.poll(now)?;
        Some(self.evaluate(snapshot))
    }

    /// Evaluate the pending request immediately, ignoring the window.
    pub fn flush(&mut self) -> Option<ChangeVerdict> {
        let snapshot = self.debouncer.cancel()?;
        Some(self.evaluate(snapshot))
    }

    /// Compare immediately, discarding any pending request.
    pub fn evaluate_now(
        &mut self,
        buffer: &PixelBuffer,
        fingerprint: FilterFingerprint,
    ) -> ChangeVerdict {
        self.debouncer.cancel();
        let snapshot = ChangeSnapshot::capture(buffer, fingerprint, self.config.pixel_sampling);
        self.evaluate(snapshot)
    }

    /// Idle or pending.
    #[must_use]
    pub fn state(&self) -> DetectorState {
        self.debouncer
            .deadline()
            .map_or(DetectorState::Idle, |deadline| DetectorState::Pending { deadline })
    }

    /// Whether a baseline has been recorded.
    #[must_use]
    pub const fn has_previous_state(&self) -> bool {
        self.previous.is_some()
    }

    /// The last evaluated snapshot.
    #[must_use]
    pub const fn previous(&self) -> Option<&ChangeSnapshot> {
        self.previous.as_ref()
    }

    /// Forget the baseline and any pending request.
    pub fn reset(&mut self) {
        self.previous = None;
        self.debouncer.cancel();
    }

    /// Compare `snapshot` with the baseline, then make it the baseline.
    fn evaluate(&mut self, snapshot: ChangeSnapshot) -> ChangeVerdict {
        let verdict = self
            .previous
            .as_ref()
            .map_or(ChangeVerdict::Baseline, |previous| {
                compare(previous, &snapshot, &self.config)
            });
        tracing::debug!(?verdict, dimensions = %snapshot.dimensions, "change check evaluated");
        self.previous = Some(snapshot);
        verdict
    }
}

/// Dimensions, then filter state, then sampled pixels.
fn compare(
    previous: &ChangeSnapshot,
    current: &ChangeSnapshot,
    config: &ChangeDetectionConfig,
) -> ChangeVerdict {
    if previous.dimensions.max_axis_delta(current.dimensions) > config.dimension_tolerance {
        return ChangeVerdict::Changed(ChangeReason::Dimensions {
            previous: previous.dimensions,
            current: current.dimensions,
        });
    }

    if let Some(name) = current.fingerprint.first_difference(&previous.fingerprint) {
        return ChangeVerdict::Changed(ChangeReason::Filter(name.to_owned()));
    }

    if config.pixel_sampling {
        if previous.samples.len() != current.samples.len() {
            return ChangeVerdict::Changed(ChangeReason::Pixels {
                sample: previous.samples.len().min(current.samples.len()),
            });
        }
        let tolerance = config.pixel_tolerance;
        let differs = |a: &Rgba, b: &Rgba| a.iter().zip(b).any(|(x, y)| x.abs_diff(*y) > tolerance);
        if let Some(sample) = previous
            .samples
            .iter()
            .zip(&current.samples)
            .position(|(a, b)| differs(a, b))
        {
            return ChangeVerdict::Changed(ChangeReason::Pixels { sample });
        }
    }

    ChangeVerdict::Unchanged
}

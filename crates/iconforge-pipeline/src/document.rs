//! Per-image edit state and the registry that owns it.
//!
//! Each [`DocumentContext`] exclusively owns its original buffer, its
//! pipeline, its derived buffer and its change detector. Nothing is
//! shared between documents. [`DocumentRegistry`] maps ids to contexts
//! and remembers which one is active; "active" is just another id, never
//! a reference into the map.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use serde::{Deserialize, Serialize};
use web_time::{Instant, SystemTime};

use crate::buffer::PixelBuffer;
use crate::change::{ChangeDetector, ChangeVerdict};
use crate::config::EditorConfig;
use crate::pipeline::{FilterPipeline, RunSummary};
use crate::types::Dimensions;

/// Opaque document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an id from a source's name, byte size and modification
    /// time (milliseconds since the epoch). Everything outside
    /// `[A-Za-z0-9]` becomes `_`.
    #[must_use]
    pub fn generate(name: &str, byte_len: usize, modified_ms: u64) -> Self {
        let raw = format!("{modified_ms}_{byte_len}_{name}");
        Self(
            raw.chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect(),
        )
    }

    /// The identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DocumentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Summary of one document for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Document id.
    pub id: DocumentId,
    /// Source name (usually the file name).
    pub name: String,
    /// Dimensions of the original buffer.
    pub original: Dimensions,
    /// Dimensions of the derived buffer, if computed.
    pub derived: Option<Dimensions>,
    /// Whether there are unsaved changes.
    pub dirty: bool,
    /// Enabled filter names in order.
    pub active_filters: Vec<String>,
    /// Last modification, milliseconds since the epoch.
    pub last_modified_ms: u64,
}

/// Edit state for one source image.
#[derive(Debug)]
pub struct DocumentContext {
    id: DocumentId,
    name: String,
    original: PixelBuffer,
    pipeline: FilterPipeline,
    derived: Option<PixelBuffer>,
    dirty: bool,
    last_modified: SystemTime,
    change_detector: ChangeDetector,
}

impl DocumentContext {
    /// A context with default, disabled filters and no derived buffer.
    #[must_use]
    pub fn new(
        id: DocumentId,
        name: impl Into<String>,
        original: PixelBuffer,
        config: &EditorConfig,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            original,
            pipeline: FilterPipeline::with_scale_bounds(config.scale_bounds),
            derived: None,
            dirty: false,
            last_modified: SystemTime::now(),
            change_detector: ChangeDetector::new(config.change_detection.clone()),
        }
    }

    /// Document id.
    #[must_use]
    pub const fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The immutable original buffer.
    #[must_use]
    pub const fn original(&self) -> &PixelBuffer {
        &self.original
    }

    /// The last recomputed buffer, if it is current.
    #[must_use]
    pub const fn derived(&self) -> Option<&PixelBuffer> {
        self.derived.as_ref()
    }

    /// What to show: the derived buffer if present, else the original.
    #[must_use]
    pub fn display_buffer(&self) -> &PixelBuffer {
        self.derived.as_ref().unwrap_or(&self.original)
    }

    /// This document's pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &FilterPipeline {
        &self.pipeline
    }

    /// Mutable pipeline access. The derived buffer is discarded, since
    /// it may no longer match the pipeline state.
    pub fn pipeline_mut(&mut self) -> &mut FilterPipeline {
        self.derived = None;
        &mut self.pipeline
    }

    /// This document's change detector.
    #[must_use]
    pub const fn change_detector(&self) -> &ChangeDetector {
        &self.change_detector
    }

    /// Mutable change detector access.
    pub const fn change_detector_mut(&mut self) -> &mut ChangeDetector {
        &mut self.change_detector
    }

    /// Recompute the derived buffer from the original with the current
    /// pipeline state.
    pub fn recompute_derived(&mut self) -> RunSummary {
        let report = self.pipeline.run(&self.original);
        self.derived = Some(report.output);
        self.dirty = self.pipeline.has_active_filters();
        self.last_modified = SystemTime::now();
        tracing::debug!(
            id = %self.id,
            applied = ?report.summary.applied,
            failed = report.summary.failures.len(),
            "derived buffer recomputed"
        );
        report.summary
    }

    /// Recompute, then queue a change check on the result.
    pub fn refresh(&mut self, now: Instant) -> RunSummary {
        let summary = self.recompute_derived();
        let fingerprint = self.pipeline.fingerprint();
        let shown = self.derived.as_ref().unwrap_or(&self.original);
        self.change_detector.detect_changes(shown, fingerprint, now);
        summary
    }

    /// Poll the change detector. A [`ChangeVerdict::Changed`] means the
    /// display should be redrawn.
    pub fn poll_display_change(&mut self, now: Instant) -> Option<ChangeVerdict> {
        self.change_detector.poll(now)
    }

    /// Drop all edits: disable every filter and show the original.
    pub fn restore_original(&mut self) {
        self.pipeline.disable_all();
        self.derived = Some(self.original.clone());
        self.dirty = false;
        self.last_modified = SystemTime::now();
    }

    /// Record that the current state has been exported.
    pub const fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Whether the derived buffer has changes not yet exported.
    #[must_use]
    pub const fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// When the derived state last changed.
    #[must_use]
    pub const fn last_modified(&self) -> SystemTime {
        self.last_modified
    }

    /// Display summary.
    #[must_use]
    pub fn info(&self) -> DocumentInfo {
        let last_modified_ms = self
            .last_modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        DocumentInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            original: self.original.dimensions(),
            derived: self.derived.as_ref().map(PixelBuffer::dimensions),
            dirty: self.dirty,
            active_filters: self.pipeline.active_filters(),
            last_modified_ms,
        }
    }
}

/// Counts describing a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Open documents.
    pub total: usize,
    /// Documents with unsaved changes.
    pub dirty: usize,
    /// Active document, if any.
    pub active: Option<DocumentId>,
}

/// Owns every open document.
#[derive(Debug, Default)]
pub struct DocumentRegistry {
    contexts: HashMap<DocumentId, DocumentContext>,
    active: Option<DocumentId>,
    config: EditorConfig,
}

impl DocumentRegistry {
    /// An empty registry creating documents with `config`.
    #[must_use]
    pub fn new(config: EditorConfig) -> Self {
        Self {
            contexts: HashMap::new(),
            active: None,
            config,
        }
    }

    /// Configuration applied to new documents.
    #[must_use]
    pub const fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Open a document for `source`.
    ///
    /// If `id` is already open the existing context is returned
    /// untouched and `source` is dropped.
    pub fn create_context(
        &mut self,
        id: DocumentId,
        name: impl Into<String>,
        source: PixelBuffer,
    ) -> &mut DocumentContext {
        match self.contexts.entry(id) {
            Entry::Occupied(entry) => {
                tracing::warn!(id = %entry.key(), "document already open, keeping existing context");
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                let id = entry.key().clone();
                tracing::info!(%id, dimensions = %source.dimensions(), "document opened");
                entry.insert(DocumentContext::new(id, name, source, &self.config))
            }
        }
    }

    /// Make `id` the active document. An unknown id is logged and
    /// leaves the previous active document in place.
    pub fn set_active(&mut self, id: &str) -> bool {
        match self.contexts.get_key_value(id) {
            Some((key, _)) => {
                tracing::info!(id, "document activated");
                self.active = Some(key.clone());
                true
            }
            None => {
                tracing::warn!(id, "cannot activate unknown document");
                false
            }
        }
    }

    /// Active document id.
    #[must_use]
    pub const fn active_id(&self) -> Option<&DocumentId> {
        self.active.as_ref()
    }

    /// Active document.
    #[must_use]
    pub fn active(&self) -> Option<&DocumentContext> {
        self.active.as_ref().and_then(|id| self.contexts.get(id))
    }

    /// Active document, mutably.
    pub fn active_mut(&mut self) -> Option<&mut DocumentContext> {
        self.active.as_ref().and_then(|id| self.contexts.get_mut(id))
    }

    /// Close a document, releasing its buffers and filter state. Clears
    /// the active id if it pointed here. Returns `false` if unknown.
    pub fn remove_context(&mut self, id: &str) -> bool {
        let Some(context) = self.contexts.remove(id) else {
            tracing::warn!(id, "cannot remove unknown document");
            return false;
        };
        if self.active.as_ref().is_some_and(|active| active.as_str() == id) {
            self.active = None;
        }
        tracing::info!(id, "document closed");
        drop(context);
        true
    }

    /// Look up a document.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&DocumentContext> {
        self.contexts.get(id)
    }

    /// Look up a document mutably.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut DocumentContext> {
        self.contexts.get_mut(id)
    }

    /// Whether `id` is open.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.contexts.contains_key(id)
    }

    /// Open ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<DocumentId> {
        let mut ids: Vec<DocumentId> = self.contexts.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of open documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether no document is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Close every document.
    pub fn clear_all(&mut self) {
        tracing::info!(count = self.contexts.len(), "closing all documents");
        self.contexts.clear();
        self.active = None;
    }

    /// Counts.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total: self.contexts.len(),
            dirty: self
                .contexts
                .values()
                .filter(|c| c.has_unsaved_changes())
                .count(),
            active: self.active.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn buffer(w: u32, h: u32, v: u8) -> PixelBuffer {
        PixelBuffer::filled(w, h, [v, v / 2, 0, 255]).unwrap()
    }

    #[test]
    fn generated_ids_are_sanitized() {
        let id = DocumentId::generate("my photo (1).png", 2048, 1_700_000_000_000);
        assert_eq!(id.as_str(), "1700000000000_2048_my_photo__1__png");
    }

    #[test]
    fn create_is_idempotent() {
        let mut registry = DocumentRegistry::default();
        registry.create_context("a".into(), "a.png", buffer(4, 4, 10));
        let again = registry.create_context("a".into(), "other.png", buffer(8, 8, 99));
        assert_eq!(again.name(), "a.png");
        assert_eq!(again.original().dimensions(), Dimensions::new(4, 4));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_active_keeps_previous() {
        let mut registry = DocumentRegistry::default();
        registry.create_context("a".into(), "a", buffer(2, 2, 0));
        assert!(registry.set_active("a"));
        assert!(!registry.set_active("missing"));
        assert_eq!(registry.active_id().map(DocumentId::as_str), Some("a"));
    }

    #[test]
    fn removing_active_clears_pointer() {
        let mut registry = DocumentRegistry::default();
        registry.create_context("a".into(), "a", buffer(2, 2, 0));
        registry.create_context("b".into(), "b", buffer(2, 2, 0));
        registry.set_active("a");

        assert!(registry.remove_context("b"));
        assert_eq!(registry.active_id().map(DocumentId::as_str), Some("a"));
        assert!(registry.remove_context("a"));
        assert!(registry.active().is_none());
        assert!(!registry.remove_context("a"));
    }

    #[test]
    fn documents_are_isolated() {
        let mut registry = DocumentRegistry::default();
        registry.create_context("a".into(), "a", buffer(10, 6, 100));
        registry.create_context("b".into(), "b", buffer(10, 6, 200));

        let a = registry.get_mut("a").unwrap();
        a.pipeline_mut().enable("square");
        a.recompute_derived();

        let b = registry.get("b").unwrap();
        assert!(b.derived().is_none());
        assert!(!b.pipeline().has_active_filters());
        assert_eq!(
            registry.get("a").unwrap().derived().unwrap().dimensions(),
            Dimensions::new(6, 6)
        );
    }

    #[test]
    fn recompute_restore_and_save() {
        let mut registry = DocumentRegistry::default();
        let doc = registry.create_context("a".into(), "a", buffer(10, 6, 100));
        assert!(!doc.has_unsaved_changes());
        assert_eq!(doc.display_buffer(), doc.original());

        doc.pipeline_mut().enable("grayscale");
        let summary = doc.recompute_derived();
        assert_eq!(summary.applied, ["grayscale"]);
        assert!(doc.has_unsaved_changes());
        assert_ne!(doc.display_buffer(), doc.original());

        doc.mark_saved();
        assert!(!doc.has_unsaved_changes());

        doc.restore_original();
        assert!(!doc.pipeline().has_active_filters());
        assert_eq!(doc.display_buffer(), doc.original());
    }

    #[test]
    fn pipeline_mutation_invalidates_derived() {
        let mut registry = DocumentRegistry::default();
        let doc = registry.create_context("a".into(), "a", buffer(3, 3, 1));
        doc.recompute_derived();
        assert!(doc.derived().is_some());
        doc.pipeline_mut().enable("resolution");
        assert!(doc.derived().is_none());
    }

    #[test]
    fn refresh_feeds_change_detector() {
        let t0 = Instant::now();
        let window = Duration::from_millis(100);
        let mut registry = DocumentRegistry::default();
        let doc = registry.create_context("a".into(), "a", buffer(8, 4, 50));

        doc.refresh(t0);
        assert_eq!(doc.poll_display_change(t0 + window), Some(ChangeVerdict::Baseline));

        doc.pipeline_mut().enable("square");
        doc.refresh(t0 + window);
        let verdict = doc.poll_display_change(t0 + 2 * window).unwrap();
        assert!(verdict.is_changed());
    }

    #[test]
    fn info_and_stats() {
        let mut registry = DocumentRegistry::default();
        registry.create_context("b".into(), "b.png", buffer(5, 5, 0));
        let doc = registry.create_context("a".into(), "a.png", buffer(4, 2, 0));
        doc.pipeline_mut().enable("square");
        doc.recompute_derived();
        registry.set_active("a");

        let info = registry.active().unwrap().info();
        assert_eq!(info.name, "a.png");
        assert_eq!(info.derived, Some(Dimensions::new(2, 2)));
        assert_eq!(info.active_filters, ["square"]);
        assert!(info.dirty);
        assert!(info.last_modified_ms > 0);

        let stats = registry.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.dirty, 1);
        assert_eq!(stats.active, Some(DocumentId::new("a")));
        assert_eq!(
            registry.ids(),
            [DocumentId::new("a"), DocumentId::new("b")]
        );

        registry.clear_all();
        assert!(registry.is_empty());
        assert!(registry.active_id().is_none());
    }
}

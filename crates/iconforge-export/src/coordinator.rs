//! Export orchestration.
//!
//! [`ExportCoordinator`] turns documents into files. Work goes to the
//! background [`WorkerPool`] when one is running and healthy; if the
//! worker path fails for any reason the same task is run synchronously
//! on the calling thread instead. A deadline covers the whole
//! operation. Waiting on the worker stops at the deadline and reports a
//! [`TimeoutError`]. The synchronous path cannot be interrupted once
//! running, so its result is discarded and reported as a timeout if it
//! arrives after the deadline.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use iconforge_pipeline::{Dimensions, DocumentContext, DocumentId, PixelBuffer};
use web_time::Instant;

use crate::archive::{ArchiveEntry, pack};
use crate::bundle::plan_sizes;
use crate::codec::OutputFormat;
use crate::config::ExportConfig;
use crate::error::{ExportError, TimeoutError, WorkerError};
use crate::naming::{batch_archive_name, bundle_archive_name, today};
use crate::protocol::{
    BatchItem, BatchJob, Bundle, BundleJob, CompressJob, EncodedImage, Progress, ResizeJob,
    TaskOutput, WorkerTask,
};
use crate::scratch::ScratchPool;
use crate::tasks::run_task;
use crate::worker::{WaitOutcome, WorkerPool};

/// MIME type of packaged archives.
pub const ARCHIVE_MIME: &str = "application/zip";

/// A finished export, ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutput {
    /// One standalone file.
    File {
        /// File name.
        name: String,
        /// MIME type.
        mime: &'static str,
        /// Contents.
        bytes: Vec<u8>,
    },
    /// Several files packaged into a zip archive.
    Archive {
        /// Archive file name.
        name: String,
        /// Names of the packaged entries.
        entries: Vec<String>,
        /// Archive bytes.
        bytes: Vec<u8>,
    },
}

impl ExportOutput {
    /// File name to save as.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Archive { name, .. } => name,
        }
    }

    /// Encoded contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::File { bytes, .. } | Self::Archive { bytes, .. } => bytes,
        }
    }

    /// MIME type of the contents.
    #[must_use]
    pub const fn mime(&self) -> &'static str {
        match self {
            Self::File { mime, .. } => *mime,
            Self::Archive { .. } => ARCHIVE_MIME,
        }
    }

    /// Package named blobs: one becomes a file, several an archive
    /// named `archive_name`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Archive`] if packaging fails.
    pub fn package(
        mut files: Vec<(ArchiveEntry, &'static str)>,
        archive_name: impl FnOnce() -> String,
    ) -> Result<Option<Self>, ExportError> {
        match files.len() {
            0 => Ok(None),
            1 => Ok(files.pop().map(|(entry, mime)| Self::File {
                name: entry.name,
                mime,
                bytes: entry.bytes,
            })),
            _ => {
                let packed = pack(files.iter().map(|(entry, _)| entry))?;
                Ok(Some(Self::Archive {
                    name: archive_name(),
                    entries: packed.names,
                    bytes: packed.bytes,
                }))
            }
        }
    }
}

impl From<EncodedImage> for ExportOutput {
    fn from(image: EncodedImage) -> Self {
        Self::File {
            name: image.name,
            mime: image.format.mime(),
            bytes: image.bytes,
        }
    }
}

/// Marks documents as having an export in flight until dropped.
struct InFlight<'c> {
    set: &'c Mutex<HashSet<DocumentId>>,
    ids: Vec<DocumentId>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        for id in &self.ids {
            set.remove(id);
        }
    }
}

/// Runs exports through the worker with a synchronous fallback.
#[derive(Debug)]
pub struct ExportCoordinator {
    config: ExportConfig,
    pool: Option<WorkerPool>,
    scratch: ScratchPool,
    in_flight: Mutex<HashSet<DocumentId>>,
}

impl ExportCoordinator {
    /// A coordinator that runs everything on the calling thread.
    #[must_use]
    pub fn new(config: ExportConfig) -> Self {
        Self::with_pool(config, None)
    }

    /// A coordinator backed by a freshly spawned worker. If the worker
    /// cannot start, exports run synchronously.
    #[must_use]
    pub fn with_worker(config: ExportConfig) -> Self {
        let pool = WorkerPool::spawn(config.scratch_pool_size)
            .inspect_err(|e| tracing::warn!(error = %e, "export worker unavailable"))
            .ok();
        Self::with_pool(config, pool)
    }

    /// A coordinator using `pool`, if any.
    #[must_use]
    pub fn with_pool(config: ExportConfig, pool: Option<WorkerPool>) -> Self {
        Self {
            scratch: ScratchPool::new(config.scratch_pool_size),
            config,
            pool,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Whether a healthy worker is attached.
    #[must_use]
    pub fn has_worker(&self) -> bool {
        self.pool.as_ref().is_some_and(WorkerPool::is_available)
    }

    /// Stop the worker; later exports run synchronously.
    pub fn terminate_worker(&mut self) {
        if let Some(mut pool) = self.pool.take() {
            pool.terminate();
        }
    }

    fn in_flight(&self) -> MutexGuard<'_, HashSet<DocumentId>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn claim<'d>(
        &self,
        ids: impl IntoIterator<Item = &'d DocumentId>,
    ) -> Result<InFlight<'_>, ExportError> {
        let mut guard = InFlight {
            set: &self.in_flight,
            ids: Vec::new(),
        };
        for id in ids {
            let inserted = self.in_flight().insert(id.clone());
            if !inserted {
                tracing::warn!(%id, "export already in flight");
                return Err(ExportError::Busy(id.clone()));
            }
            guard.ids.push(id.clone());
        }
        Ok(guard)
    }

    /// Run `task`, preferring the worker.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Timeout`] if the deadline passes, or the
    /// error of the synchronous run.
    pub fn run(
        &self,
        task: WorkerTask,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<TaskOutput, ExportError> {
        let started = Instant::now();
        let deadline = started + self.config.timeout;
        let timeout = || {
            tracing::error!(
                kind = task.kind(),
                budget_secs = self.config.timeout.as_secs_f64(),
                "export timed out"
            );
            ExportError::Timeout(TimeoutError {
                budget: self.config.timeout,
            })
        };

        if let Some(pool) = self.pool.as_ref().filter(|p| p.is_available()) {
            let attempt = pool
                .dispatch(task.clone())
                .map(|ticket| ticket.wait(deadline, &mut *progress));
            match attempt {
                Ok(WaitOutcome::Done(output)) => return Ok(output),
                Ok(WaitOutcome::TimedOut) => return Err(timeout()),
                Ok(WaitOutcome::Failed(e)) | Err(e) => {
                    tracing::warn!(kind = task.kind(), error = %e, "worker failed, running export synchronously");
                }
            }
        }

        if Instant::now() >= deadline {
            return Err(timeout());
        }
        let result = run_task(&task, &self.scratch, progress);
        if Instant::now() >= deadline {
            return Err(timeout());
        }
        let output = result?;
        tracing::debug!(
            kind = task.kind(),
            elapsed_ms = started.elapsed().as_millis(),
            "export finished synchronously"
        );
        Ok(output)
    }

    /// Encode the document's current image.
    ///
    /// Uses the derived buffer when filters are active, the original
    /// otherwise. `quality` defaults to the format's configured quality.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Busy`] if the document is already being
    /// exported, or any error of [`run`](Self::run).
    pub fn export_single(
        &self,
        document: &DocumentContext,
        format: OutputFormat,
        quality: Option<u8>,
    ) -> Result<ExportOutput, ExportError> {
        let _claim = self.claim([document.id()])?;
        let job = CompressJob {
            name: document.name().to_owned(),
            buffer: export_source(document).into_owned(),
            format,
            quality: quality.or_else(|| format.default_quality(&self.config)),
            max_width_or_height: None,
        };
        match self.run(WorkerTask::Compress(job), &mut |_| {})? {
            TaskOutput::Encoded(image) => {
                tracing::info!(id = %document.id(), name = %image.name, bytes = image.bytes.len(), "exported image");
                Ok(image.into())
            }
            _ => Err(WorkerError::UnexpectedOutput { task: "compress" }.into()),
        }
    }

    /// Resample the document's current image to exactly `size` and
    /// encode it as `<stem>_<W>x<H>.png`. The aspect ratio is not kept.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Busy`] if the document is already being
    /// exported, [`ExportError::Validation`] for a zero-sized target, or
    /// any error of [`run`](Self::run).
    pub fn export_resized(
        &self,
        document: &DocumentContext,
        size: Dimensions,
    ) -> Result<ExportOutput, ExportError> {
        let _claim = self.claim([document.id()])?;
        let job = ResizeJob {
            name: document.name().to_owned(),
            buffer: export_source(document).into_owned(),
            size,
        };
        match self.run(WorkerTask::Resize(job), &mut |_| {})? {
            TaskOutput::Encoded(image) => {
                tracing::info!(id = %document.id(), name = %image.name, %size, "exported resized image");
                Ok(image.into())
            }
            _ => Err(WorkerError::UnexpectedOutput { task: "resize" }.into()),
        }
    }

    /// Render the original image at every requested size.
    ///
    /// An empty `sizes` uses the configured defaults. Hidden base sizes
    /// are rendered too but not emitted. One visible entry is returned
    /// as a plain `.ico`, several are packaged as
    /// `<stem>_icons_<date>.zip`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Validation`] for sizes out of range,
    /// [`ExportError::EmptyBundle`] when nothing visible could be
    /// rendered, and the errors of [`run`](Self::run).
    pub fn export_bundle(
        &self,
        document: &DocumentContext,
        sizes: &[u32],
    ) -> Result<(ExportOutput, Bundle), ExportError> {
        let all_sizes = plan_sizes(sizes, &self.config)?;
        let _claim = self.claim([document.id()])?;
        let job = BundleJob {
            name: document.name().to_owned(),
            buffer: document.original().clone(),
            sizes: all_sizes,
            hidden_sizes: self.config.hidden_sizes.clone(),
        };
        let TaskOutput::Bundle(bundle) = self.run(WorkerTask::CreateMultiSize(job), &mut |_| {})?
        else {
            return Err(WorkerError::UnexpectedOutput {
                task: "createMultiSize",
            }
            .into());
        };

        let files = bundle
            .entries
            .iter()
            .map(|entry| {
                let file = ArchiveEntry {
                    name: entry.name.clone(),
                    bytes: entry.bytes.clone(),
                };
                (file, OutputFormat::Ico.mime())
            })
            .collect();
        let output = ExportOutput::package(files, || bundle_archive_name(document.name(), today()))?
            .ok_or_else(|| ExportError::EmptyBundle {
                failures: bundle.failures.clone(),
            })?;
        tracing::info!(
            id = %document.id(),
            name = output.name(),
            entries = bundle.entries.len(),
            "exported icon bundle"
        );
        Ok((output, bundle))
    }

    /// Compress each document's current image, shrinking it to fit
    /// [`ExportConfig::max_width_or_height`].
    ///
    /// Always yields one [`BatchItem`] per document, in order.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Busy`] if any document is already being
    /// exported, or any error of [`run`](Self::run).
    pub fn batch_compress(
        &self,
        documents: &[&DocumentContext],
        format: OutputFormat,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<Vec<BatchItem>, ExportError> {
        let _claim = self.claim(documents.iter().map(|d| d.id()))?;
        let items = documents
            .iter()
            .map(|document| CompressJob {
                name: document.name().to_owned(),
                buffer: export_source(document).into_owned(),
                format,
                quality: format.default_quality(&self.config),
                max_width_or_height: Some(self.config.max_width_or_height),
            })
            .collect();
        match self.run(WorkerTask::BatchCompress(BatchJob { items }), progress)? {
            TaskOutput::Batch(results) => {
                let failed = results.iter().filter(|r| r.outcome.is_err()).count();
                tracing::info!(total = results.len(), failed, "batch compressed");
                Ok(results)
            }
            _ => Err(WorkerError::UnexpectedOutput {
                task: "batchCompress",
            }
            .into()),
        }
    }

    /// Package the successful items of a batch: one becomes a file,
    /// several become `converted_images_<date>.zip`. `None` if every
    /// item failed.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Archive`] if packaging fails.
    pub fn package_batch(results: &[BatchItem]) -> Result<Option<ExportOutput>, ExportError> {
        let files = results
            .iter()
            .filter_map(|item| item.outcome.as_ref().ok())
            .map(|image| {
                let file = ArchiveEntry {
                    name: image.name.clone(),
                    bytes: image.bytes.clone(),
                };
                (file, image.format.mime())
            })
            .collect();
        ExportOutput::package(files, || batch_archive_name(today()))
    }
}

/// The buffer an export should encode: derived if filters are active.
fn export_source(document: &DocumentContext) -> Cow<'_, PixelBuffer> {
    match document.derived() {
        Some(derived) => Cow::Borrowed(derived),
        None if document.pipeline().has_active_filters() => {
            Cow::Owned(document.pipeline().apply_all(document.original()))
        }
        None => Cow::Borrowed(document.original()),
    }
}

//! Error types for the export layer.
//!
//! Lower-level causes keep their detail for logging; what a user sees
//! comes from [`ExportError::user_message`].

use std::time::Duration;

use iconforge_pipeline::{DocumentId, ValidationError};
use serde::{Deserialize, Serialize};

use crate::codec::OutputFormat;

/// An encoder rejected a buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("failed to encode {format}: {message}")]
pub struct CodecError {
    /// Target format.
    pub format: OutputFormat,
    /// Encoder message.
    pub message: String,
}

impl CodecError {
    pub(crate) fn new(format: OutputFormat, cause: impl std::fmt::Display) -> Self {
        Self {
            format,
            message: cause.to_string(),
        }
    }
}

/// One bundle entry could not be generated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("icon size {size} failed: {cause}")]
pub struct ExportSizeError {
    /// Requested side length.
    pub size: u32,
    /// What went wrong.
    pub cause: String,
}

/// Dispatch or processing fault on the background worker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    /// No worker thread is running.
    #[error("export worker is not available")]
    Unavailable,

    /// The worker thread could not be started.
    #[error("failed to start export worker: {0}")]
    Spawn(String),

    /// The worker stopped before answering.
    #[error("export worker stopped before replying to task {id}")]
    Disconnected {
        /// Correlation id of the abandoned task.
        id: u64,
    },

    /// The worker answered with an error.
    #[error("worker task {id} failed: {message}")]
    Task {
        /// Correlation id.
        id: u64,
        /// The worker's message.
        message: String,
    },

    /// The worker answered with a result of the wrong shape.
    #[error("worker returned an unexpected result for {task}")]
    UnexpectedOutput {
        /// Wire name of the task.
        task: &'static str,
    },
}

/// An export ran past its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("export timed out after {:.1}s", .budget.as_secs_f64())]
pub struct TimeoutError {
    /// The configured budget.
    pub budget: Duration,
}

/// Packaging entries into an archive failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to build archive: {message}")]
pub struct ArchiveError {
    /// Underlying cause.
    pub message: String,
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(e: zip::result::ZipError) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(e: std::io::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

/// Everything an export operation can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The request or its input was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Encoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Every bundle size failed.
    #[error("no bundle entries could be generated ({} sizes failed)", .failures.len())]
    EmptyBundle {
        /// The per-size failures.
        failures: Vec<ExportSizeError>,
    },

    /// The worker failed and so did the fallback.
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// The operation exceeded its budget.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// The document already has an export in flight.
    #[error("an export for document {0} is already running")]
    Busy(DocumentId),

    /// Archive packaging failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

impl ExportError {
    /// Short machine-readable kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Codec(_) => "codec",
            Self::EmptyBundle { .. } => "empty_bundle",
            Self::Worker(_) => "worker",
            Self::Timeout(_) => "timeout",
            Self::Busy(_) => "busy",
            Self::Archive(_) => "archive",
        }
    }

    /// Message safe to show to a user. Never includes internal detail.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(_) => "The image could not be read. Check its type and size.",
            Self::Codec(_) => "The image could not be saved in the requested format.",
            Self::EmptyBundle { .. } => "None of the icon sizes could be generated.",
            Self::Worker(_) => "The export could not be completed.",
            Self::Timeout(_) => "The export took too long and was cancelled.",
            Self::Busy(_) => "This image is already being exported.",
            Self::Archive(_) => "The download archive could not be created.",
        }
    }
}

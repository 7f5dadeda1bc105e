//! iconforge-export: encoders, icon bundles and background export.
//!
//! Takes documents from `iconforge-pipeline` and produces files:
//! a single re-encoded image, a multi-size icon bundle, or a batch of
//! compressed images. Bytes go in and out of memory only; writing them
//! anywhere is the caller's job.
//!
//! Work runs on a [`WorkerPool`] thread when one is attached to the
//! [`ExportCoordinator`], with a synchronous fallback that produces the
//! same output.

pub mod archive;
pub mod bundle;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod naming;
pub mod protocol;
pub mod scratch;
pub mod tasks;
pub mod worker;

pub use archive::{ArchiveEntry, Packed};
pub use codec::{OutputFormat, encode};
pub use config::ExportConfig;
pub use coordinator::{ExportCoordinator, ExportOutput};
pub use error::{ArchiveError, CodecError, ExportError, ExportSizeError, TimeoutError, WorkerError};
pub use protocol::{
    BatchItem, Bundle, BundleEntry, EncodedImage, Progress, TaskFailure, TaskOutput, WorkerRequest,
    WorkerResponse, WorkerTask,
};
pub use scratch::ScratchPool;
pub use worker::{Ticket, WaitOutcome, WorkerPool};

//! Worker task protocol.
//!
//! Requests are `{ "type": <task>, "data": <payload>, "id": <u64> }`.
//! Responses are `{ "type": "success" | "error" | "progress" | "ready",
//! "data": ..., "id": <u64> }`; the readiness message carries no id.
//! Inside the process the messages travel as typed values over
//! channels; the serde shape is the contract for any other transport.

use iconforge_pipeline::{Dimensions, PixelBuffer};
use serde::{Deserialize, Serialize};

use crate::codec::OutputFormat;
use crate::error::{ExportError, ExportSizeError};

/// Encode an image, first shrinking it to fit a bound if one is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressJob {
    /// Source file name, used to derive the output name.
    pub name: String,
    /// Pixels to encode.
    pub buffer: PixelBuffer,
    /// Target format.
    pub format: OutputFormat,
    /// Lossy quality, if the format uses one.
    pub quality: Option<u8>,
    /// Longest side of the output, `None` to keep the size.
    pub max_width_or_height: Option<u32>,
}

/// Resample to an exact size and encode as PNG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeJob {
    /// Source file name.
    pub name: String,
    /// Pixels to resample.
    pub buffer: PixelBuffer,
    /// Output size.
    pub size: Dimensions,
}

/// Render one square ICO per size from the original pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleJob {
    /// Source file name.
    pub name: String,
    /// The original (unfiltered-size) pixels.
    pub buffer: PixelBuffer,
    /// Every size to generate, sorted and deduplicated.
    pub sizes: Vec<u32>,
    /// Sizes generated but left out of the result.
    pub hidden_sizes: Vec<u32>,
}

/// Compress several images, reporting progress after each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJob {
    /// One entry per input file.
    pub items: Vec<CompressJob>,
}

/// A unit of export work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum WorkerTask {
    /// See [`CompressJob`].
    Compress(CompressJob),
    /// See [`ResizeJob`].
    Resize(ResizeJob),
    /// See [`BundleJob`].
    CreateMultiSize(BundleJob),
    /// See [`BatchJob`].
    BatchCompress(BatchJob),
}

impl WorkerTask {
    /// Wire name of the task type.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Compress(_) => "compress",
            Self::Resize(_) => "resize",
            Self::CreateMultiSize(_) => "createMultiSize",
            Self::BatchCompress(_) => "batchCompress",
        }
    }
}

/// A request as posted to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// The work.
    #[serde(flatten)]
    pub task: WorkerTask,
    /// Correlation id, unique per pool.
    pub id: u64,
}

/// One encoded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    /// Output file name.
    pub name: String,
    /// Encoding used.
    pub format: OutputFormat,
    /// Pixel dimensions of the encoded image.
    pub dimensions: Dimensions,
    /// Encoded bytes.
    pub bytes: Vec<u8>,
}

/// One visible entry of an icon bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    /// Side length in pixels.
    pub size: u32,
    /// Entry file name.
    pub name: String,
    /// ICO bytes.
    pub bytes: Vec<u8>,
}

/// Result of a [`BundleJob`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Visible entries in ascending size order.
    pub entries: Vec<BundleEntry>,
    /// Every size that was rendered, hidden ones included.
    pub generated: Vec<u32>,
    /// Sizes that failed.
    pub failures: Vec<ExportSizeError>,
}

/// Per-file result of a [`BatchJob`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    /// Position in the batch.
    pub index: usize,
    /// Source file name.
    pub name: String,
    /// Encoded file or the reason it failed.
    pub outcome: Result<EncodedImage, TaskFailure>,
}

/// Successful result of any task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskOutput {
    /// From `compress` and `resize`.
    Encoded(EncodedImage),
    /// From `createMultiSize`.
    Bundle(Bundle),
    /// From `batchCompress`, one item per input in order.
    Batch(Vec<BatchItem>),
}

/// Serializable stand-in for an [`ExportError`].
///
/// Typed causes (codec errors, decode errors) cannot cross a message
/// boundary, so only their kind and display string travel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// [`ExportError::kind`] of the original error.
    pub kind: String,
    /// Display string of the original error.
    pub message: String,
}

impl From<&ExportError> for TaskFailure {
    fn from(e: &ExportError) -> Self {
        Self {
            kind: e.kind().to_owned(),
            message: e.to_string(),
        }
    }
}

/// Batch progress after an item completes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Percentage of items done, `(index + 1) / total * 100`.
    pub progress: f64,
    /// Index of the item just finished.
    pub index: usize,
}

impl Progress {
    /// Progress after finishing item `index` of `total`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn after(index: usize, total: usize) -> Self {
        let progress = if total == 0 {
            100.0
        } else {
            (index + 1) as f64 / total as f64 * 100.0
        };
        Self { progress, index }
    }
}

/// Payload of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ResponseBody {
    /// The worker has started and accepts requests.
    Ready,
    /// The task finished.
    Success(TaskOutput),
    /// The task failed.
    Error(TaskFailure),
    /// A batch item finished; more responses follow.
    Progress(Progress),
}

/// A message posted back by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    /// What happened.
    #[serde(flatten)]
    pub body: ResponseBody,
    /// Correlation id of the request, absent on `ready`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl WorkerResponse {
    /// The readiness announcement.
    #[must_use]
    pub const fn ready() -> Self {
        Self {
            body: ResponseBody::Ready,
            id: None,
        }
    }

    /// Whether this response settles its task.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self.body, ResponseBody::Success(_) | ResponseBody::Error(_))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_shape() {
        let request = WorkerRequest {
            task: WorkerTask::Resize(ResizeJob {
                name: "a.png".into(),
                buffer: PixelBuffer::filled(1, 1, [1, 2, 3, 4]).unwrap(),
                size: Dimensions::new(2, 2),
            }),
            id: 7,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "resize");
        assert_eq!(value["id"], 7);
        assert_eq!(value["data"]["name"], "a.png");
        assert_eq!(value["data"]["buffer"], json!([1, 1, [1, 2, 3, 4]]));
        assert_eq!(value["data"]["size"], json!({"width": 2, "height": 2}));
    }

    #[test]
    fn task_kinds_match_wire_names() {
        let task = WorkerTask::BatchCompress(BatchJob { items: Vec::new() });
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["type"], task.kind());
        assert_eq!(value["type"], "batchCompress");
    }

    #[test]
    fn progress_response_shape() {
        let response = WorkerResponse {
            body: ResponseBody::Progress(Progress::after(1, 4)),
            id: Some(3),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({"type": "progress", "data": {"progress": 50.0, "index": 1}, "id": 3})
        );
        assert!(!response.is_final());
    }

    #[test]
    fn ready_has_no_id() {
        let value = serde_json::to_value(WorkerResponse::ready()).unwrap();
        assert_eq!(value, json!({"type": "ready"}));
    }

    #[test]
    fn progress_of_last_item_is_complete() {
        let p = Progress::after(9, 10);
        assert!((p.progress - 100.0).abs() < f64::EPSILON);
    }
}

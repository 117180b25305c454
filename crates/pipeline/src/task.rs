//! Queue names, task payloads, and the worker result contract.
//!
//! Every job row carries a queue name and a JSON payload. The payload
//! shape alone does not identify the task (depth-map and analysis jobs
//! both carry `{"hailpadId": …}`), so parsing always goes through
//! [`Task::from_queue_payload`] with the claiming queue as context.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempest_core::types::DbId;

/// The five durable work queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    Blur,
    PanoramaLookup,
    PointCloud,
    DepthMap,
    HailpadAnalysis,
}

impl QueueName {
    /// All queues, in the order workers are started.
    pub const ALL: [QueueName; 5] = [
        QueueName::Blur,
        QueueName::PanoramaLookup,
        QueueName::PointCloud,
        QueueName::DepthMap,
        QueueName::HailpadAnalysis,
    ];

    /// The wire name stored in the `jobs.queue` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Blur => "blur",
            QueueName::PanoramaLookup => "panorama-lookup",
            QueueName::PointCloud => "point-cloud",
            QueueName::DepthMap => "depth-map",
            QueueName::HailpadAnalysis => "hailpad-analysis",
        }
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of pipeline work, parsed from a claimed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Blur { capture_id: DbId },
    PanoramaLookup { segment_id: DbId },
    PointCloud { scan_id: DbId },
    DepthMap { hailpad_id: DbId },
    HailpadAnalysis { hailpad_id: DbId },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CapturePayload {
    capture_id: DbId,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SegmentPayload {
    segment_id: DbId,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanPayload {
    scan_id: DbId,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HailpadPayload {
    hailpad_id: DbId,
}

impl Task {
    /// The queue this task is submitted to.
    pub fn queue(&self) -> QueueName {
        match self {
            Task::Blur { .. } => QueueName::Blur,
            Task::PanoramaLookup { .. } => QueueName::PanoramaLookup,
            Task::PointCloud { .. } => QueueName::PointCloud,
            Task::DepthMap { .. } => QueueName::DepthMap,
            Task::HailpadAnalysis { .. } => QueueName::HailpadAnalysis,
        }
    }

    /// The JSON payload stored in the job row.
    pub fn payload(&self) -> Value {
        match self {
            Task::Blur { capture_id } => serde_json::json!({ "captureId": capture_id }),
            Task::PanoramaLookup { segment_id } => {
                serde_json::json!({ "segmentId": segment_id })
            }
            Task::PointCloud { scan_id } => serde_json::json!({ "scanId": scan_id }),
            Task::DepthMap { hailpad_id } => serde_json::json!({ "hailpadId": hailpad_id }),
            Task::HailpadAnalysis { hailpad_id } => {
                serde_json::json!({ "hailpadId": hailpad_id })
            }
        }
    }

    /// Parse a job payload in the context of the queue it was claimed
    /// from.
    pub fn from_queue_payload(queue: QueueName, payload: &Value) -> Result<Self, serde_json::Error> {
        match queue {
            QueueName::Blur => {
                let p: CapturePayload = serde_json::from_value(payload.clone())?;
                Ok(Task::Blur {
                    capture_id: p.capture_id,
                })
            }
            QueueName::PanoramaLookup => {
                let p: SegmentPayload = serde_json::from_value(payload.clone())?;
                Ok(Task::PanoramaLookup {
                    segment_id: p.segment_id,
                })
            }
            QueueName::PointCloud => {
                let p: ScanPayload = serde_json::from_value(payload.clone())?;
                Ok(Task::PointCloud { scan_id: p.scan_id })
            }
            QueueName::DepthMap => {
                let p: HailpadPayload = serde_json::from_value(payload.clone())?;
                Ok(Task::DepthMap {
                    hailpad_id: p.hailpad_id,
                })
            }
            QueueName::HailpadAnalysis => {
                let p: HailpadPayload = serde_json::from_value(payload.clone())?;
                Ok(Task::HailpadAnalysis {
                    hailpad_id: p.hailpad_id,
                })
            }
        }
    }
}

/// The outcome a handler reports back to the queue.
///
/// `success: false` acknowledges the job as Failed; it is not an error
/// in the Rust sense and never triggers a retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerResult {
    pub success: bool,
    pub message: Option<String>,
}

impl WorkerResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

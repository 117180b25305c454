//! Storage ports for the pipeline.
//!
//! Handlers and the queue harness never touch SQL directly; they go
//! through [`EntityStore`] and [`JobQueue`]. [`postgres::PgStore`] backs
//! both with the real database, [`memory::MemoryStore`] backs them with
//! hash maps for tests and local runs.

use std::time::Duration;

use async_trait::async_trait;
use tempest_core::types::DbId;
use tempest_db::models::capture::{Capture, CaptureLocation, CreateCapture};
use tempest_db::models::dent::{Dent, NewDent};
use tempest_db::models::hailpad::{CreateHailpad, Hailpad};
use tempest_db::models::job::{Job, QueueCounts};
use tempest_db::models::panorama::{Panorama, UpsertPanorama};
use tempest_db::models::path::{CreatePath, Path};
use tempest_db::models::scan::{CreateScan, Scan};
use tempest_db::models::segment::{CreatePathSegment, PathSegment, SegmentRollup};
use tempest_db::models::status::{ProcessStatus, ServiceStatus};

use crate::task::{QueueName, Task};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors surfaced by either storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

/// Entity persistence as the pipeline sees it.
///
/// Status arguments are typed enums; backends convert to the stored
/// SMALLINT id at the edge. The `*_if_active` operations are conditional
/// writes that refuse to overwrite a terminal status and report whether
/// the row changed.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // -- captures --
    async fn create_capture(&self, input: CreateCapture) -> Result<Capture, StoreError>;
    async fn capture(&self, id: DbId) -> Result<Option<Capture>, StoreError>;
    async fn set_capture_status(&self, id: DbId, status: ServiceStatus) -> Result<(), StoreError>;
    /// The owning path and its artifact folder, whichever side of the
    /// segment the capture sits on.
    async fn capture_location(&self, id: DbId) -> Result<Option<CaptureLocation>, StoreError>;

    // -- paths --
    async fn create_path(&self, input: CreatePath) -> Result<Path, StoreError>;
    async fn path(&self, id: DbId) -> Result<Option<Path>, StoreError>;
    async fn set_path_status(&self, id: DbId, status: ProcessStatus) -> Result<(), StoreError>;
    async fn complete_path_if_active(&self, id: DbId, size_bytes: i64)
        -> Result<bool, StoreError>;
    async fn fail_path_if_active(&self, id: DbId) -> Result<bool, StoreError>;
    /// Delete all segments and captures of a path and return the
    /// orphaned capture file names, in one transaction. The path row
    /// itself returns to Pending with a zero size.
    async fn reset_path_rows(&self, id: DbId) -> Result<Vec<String>, StoreError>;

    // -- segments --
    async fn create_segment(&self, input: CreatePathSegment) -> Result<PathSegment, StoreError>;
    async fn segment(&self, id: DbId) -> Result<Option<PathSegment>, StoreError>;
    async fn segment_rollups(&self, path_id: DbId) -> Result<Vec<SegmentRollup>, StoreError>;
    async fn set_segment_panorama_status(
        &self,
        id: DbId,
        status: ProcessStatus,
    ) -> Result<(), StoreError>;
    async fn link_segment_panorama(&self, id: DbId, panorama_id: DbId) -> Result<(), StoreError>;
    async fn set_segment_street_view(&self, id: DbId, capture_id: DbId)
        -> Result<(), StoreError>;

    // -- panoramas --
    async fn upsert_panorama(&self, input: UpsertPanorama) -> Result<Panorama, StoreError>;

    // -- hailpads --
    async fn create_hailpad(&self, input: CreateHailpad) -> Result<Hailpad, StoreError>;
    async fn hailpad(&self, id: DbId) -> Result<Option<Hailpad>, StoreError>;
    async fn set_depth_map_status(&self, id: DbId, status: ServiceStatus)
        -> Result<(), StoreError>;
    async fn set_analysis_status(&self, id: DbId, status: ServiceStatus)
        -> Result<(), StoreError>;
    async fn set_hailpad_boxfit(&self, id: DbId, boxfit: f64) -> Result<(), StoreError>;
    async fn set_hailpad_max_depth(&self, id: DbId, max_depth: f64) -> Result<(), StoreError>;
    async fn complete_hailpad_if_active(&self, id: DbId) -> Result<bool, StoreError>;
    async fn fail_hailpad_if_active(&self, id: DbId) -> Result<bool, StoreError>;
    /// Replace every dent of a hailpad and mark its analysis Complete,
    /// in one transaction.
    async fn replace_dents(&self, hailpad_id: DbId, dents: Vec<NewDent>)
        -> Result<(), StoreError>;
    async fn dents(&self, hailpad_id: DbId) -> Result<Vec<Dent>, StoreError>;
    /// Delete all dents and return every status to Pending, in one
    /// transaction. Calibration fields survive.
    async fn reset_hailpad_rows(&self, id: DbId) -> Result<(), StoreError>;

    // -- scans --
    async fn create_scan(&self, input: CreateScan) -> Result<Scan, StoreError>;
    async fn scan(&self, id: DbId) -> Result<Option<Scan>, StoreError>;
    async fn set_scan_status(&self, id: DbId, status: ProcessStatus) -> Result<(), StoreError>;
}

/// The durable queue as workers see it.
///
/// Delivery is at-least-once: [`JobQueue::release_stale`] returns jobs
/// whose worker died back to Pending, so handlers must tolerate
/// redelivery.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Durably append a task; returns once the row is committed.
    async fn enqueue(&self, task: &Task) -> Result<Job, StoreError>;
    /// Claim the oldest pending job on a queue, if any. Never blocks on
    /// an empty queue and never double-claims under concurrency.
    async fn claim(&self, queue: QueueName) -> Result<Option<Job>, StoreError>;
    async fn complete_job(&self, job_id: DbId) -> Result<(), StoreError>;
    async fn fail_job(&self, job_id: DbId, error: &str) -> Result<(), StoreError>;
    /// Return claimed-but-unacknowledged jobs older than the visibility
    /// timeout to Pending. Returns how many were released.
    async fn release_stale(&self, older_than: Duration) -> Result<u64, StoreError>;
    async fn job(&self, job_id: DbId) -> Result<Option<Job>, StoreError>;
    async fn counts(&self, queue: QueueName) -> Result<QueueCounts, StoreError>;
}

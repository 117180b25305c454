//! Postgres-backed storage, delegating to the repository layer.

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
use tempest_db::repositories::{
    CaptureRepo, DentRepo, HailpadRepo, JobRepo, PanoramaRepo, PathRepo, ScanRepo, SegmentRepo,
};
use tempest_db::DbPool;

use super::{EntityStore, JobQueue, StoreError};
use crate::task::{QueueName, Task};

/// Both storage ports over one connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore for PgStore {
    // -- captures --

    async fn create_capture(&self, input: CreateCapture) -> Result<Capture, StoreError> {
        Ok(CaptureRepo::create(&self.pool, &input).await?)
    }

    async fn capture(&self, id: DbId) -> Result<Option<Capture>, StoreError> {
        Ok(CaptureRepo::find_by_id(&self.pool, id).await?)
    }

    async fn set_capture_status(&self, id: DbId, status: ServiceStatus) -> Result<(), StoreError> {
        Ok(CaptureRepo::set_status(&self.pool, id, status.id()).await?)
    }

    async fn capture_location(&self, id: DbId) -> Result<Option<CaptureLocation>, StoreError> {
        Ok(CaptureRepo::find_location(&self.pool, id).await?)
    }

    // -- paths --

    async fn create_path(&self, input: CreatePath) -> Result<Path, StoreError> {
        Ok(PathRepo::create(&self.pool, &input).await?)
    }

    async fn path(&self, id: DbId) -> Result<Option<Path>, StoreError> {
        Ok(PathRepo::find_by_id(&self.pool, id).await?)
    }

    async fn set_path_status(&self, id: DbId, status: ProcessStatus) -> Result<(), StoreError> {
        Ok(PathRepo::set_status(&self.pool, id, status.id()).await?)
    }

    async fn complete_path_if_active(
        &self,
        id: DbId,
        size_bytes: i64,
    ) -> Result<bool, StoreError> {
        Ok(PathRepo::complete_if_active(&self.pool, id, size_bytes).await?)
    }

    async fn fail_path_if_active(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(PathRepo::fail_if_active(&self.pool, id).await?)
    }

    async fn reset_path_rows(&self, id: DbId) -> Result<Vec<String>, StoreError> {
        Ok(PathRepo::reset(&self.pool, id).await?)
    }

    // -- segments --

    async fn create_segment(&self, input: CreatePathSegment) -> Result<PathSegment, StoreError> {
        Ok(SegmentRepo::create(&self.pool, &input).await?)
    }

    async fn segment(&self, id: DbId) -> Result<Option<PathSegment>, StoreError> {
        Ok(SegmentRepo::find_by_id(&self.pool, id).await?)
    }

    async fn segment_rollups(&self, path_id: DbId) -> Result<Vec<SegmentRollup>, StoreError> {
        Ok(SegmentRepo::list_rollup(&self.pool, path_id).await?)
    }

    async fn set_segment_panorama_status(
        &self,
        id: DbId,
        status: ProcessStatus,
    ) -> Result<(), StoreError> {
        Ok(SegmentRepo::set_panorama_status(&self.pool, id, status.id()).await?)
    }

    async fn link_segment_panorama(&self, id: DbId, panorama_id: DbId) -> Result<(), StoreError> {
        Ok(SegmentRepo::link_panorama(&self.pool, id, panorama_id).await?)
    }

    async fn set_segment_street_view(
        &self,
        id: DbId,
        capture_id: DbId,
    ) -> Result<(), StoreError> {
        Ok(SegmentRepo::set_street_view_capture(&self.pool, id, capture_id).await?)
    }

    // -- panoramas --

    async fn upsert_panorama(&self, input: UpsertPanorama) -> Result<Panorama, StoreError> {
        Ok(PanoramaRepo::upsert_by_external_id(&self.pool, &input).await?)
    }

    // -- hailpads --

    async fn create_hailpad(&self, input: CreateHailpad) -> Result<Hailpad, StoreError> {
        Ok(HailpadRepo::create(&self.pool, &input).await?)
    }

    async fn hailpad(&self, id: DbId) -> Result<Option<Hailpad>, StoreError> {
        Ok(HailpadRepo::find_by_id(&self.pool, id).await?)
    }

    async fn set_depth_map_status(
        &self,
        id: DbId,
        status: ServiceStatus,
    ) -> Result<(), StoreError> {
        Ok(HailpadRepo::set_depth_map_status(&self.pool, id, status.id()).await?)
    }

    async fn set_analysis_status(
        &self,
        id: DbId,
        status: ServiceStatus,
    ) -> Result<(), StoreError> {
        Ok(HailpadRepo::set_analysis_status(&self.pool, id, status.id()).await?)
    }

    async fn set_hailpad_boxfit(&self, id: DbId, boxfit: f64) -> Result<(), StoreError> {
        Ok(HailpadRepo::set_boxfit(&self.pool, id, boxfit).await?)
    }

    async fn set_hailpad_max_depth(&self, id: DbId, max_depth: f64) -> Result<(), StoreError> {
        Ok(HailpadRepo::set_max_depth(&self.pool, id, max_depth).await?)
    }

    async fn complete_hailpad_if_active(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(HailpadRepo::complete_if_active(&self.pool, id).await?)
    }

    async fn fail_hailpad_if_active(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(HailpadRepo::fail_if_active(&self.pool, id).await?)
    }

    async fn replace_dents(
        &self,
        hailpad_id: DbId,
        dents: Vec<NewDent>,
    ) -> Result<(), StoreError> {
        Ok(DentRepo::replace_for_hailpad(&self.pool, hailpad_id, &dents).await?)
    }

    async fn dents(&self, hailpad_id: DbId) -> Result<Vec<Dent>, StoreError> {
        Ok(DentRepo::list_by_hailpad(&self.pool, hailpad_id).await?)
    }

    async fn reset_hailpad_rows(&self, id: DbId) -> Result<(), StoreError> {
        Ok(HailpadRepo::reset(&self.pool, id).await?)
    }

    // -- scans --

    async fn create_scan(&self, input: CreateScan) -> Result<Scan, StoreError> {
        Ok(ScanRepo::create(&self.pool, &input).await?)
    }

    async fn scan(&self, id: DbId) -> Result<Option<Scan>, StoreError> {
        Ok(ScanRepo::find_by_id(&self.pool, id).await?)
    }

    async fn set_scan_status(&self, id: DbId, status: ProcessStatus) -> Result<(), StoreError> {
        Ok(ScanRepo::set_status(&self.pool, id, status.id()).await?)
    }
}

#[async_trait]
impl JobQueue for PgStore {
    async fn enqueue(&self, task: &Task) -> Result<Job, StoreError> {
        Ok(JobRepo::enqueue(&self.pool, task.queue().as_str(), &task.payload()).await?)
    }

    async fn claim(&self, queue: QueueName) -> Result<Option<Job>, StoreError> {
        Ok(JobRepo::claim_next(&self.pool, queue.as_str()).await?)
    }

    async fn complete_job(&self, job_id: DbId) -> Result<(), StoreError> {
        Ok(JobRepo::complete(&self.pool, job_id).await?)
    }

    async fn fail_job(&self, job_id: DbId, error: &str) -> Result<(), StoreError> {
        Ok(JobRepo::fail(&self.pool, job_id, error).await?)
    }

    async fn release_stale(&self, older_than: Duration) -> Result<u64, StoreError> {
        Ok(JobRepo::release_stale(&self.pool, older_than.as_secs() as i64).await?)
    }

    async fn job(&self, job_id: DbId) -> Result<Option<Job>, StoreError> {
        Ok(JobRepo::find_by_id(&self.pool, job_id).await?)
    }

    async fn counts(&self, queue: QueueName) -> Result<QueueCounts, StoreError> {
        Ok(JobRepo::counts(&self.pool, queue.as_str()).await?)
    }
}

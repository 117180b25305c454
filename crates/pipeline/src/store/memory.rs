//! In-memory storage for tests and local development.
//!
//! Mirrors the Postgres semantics the pipeline relies on: conditional
//! terminal-status writes, FIFO claim order per queue, visibility-timeout
//! release, and transactional dent replacement. One async mutex guards
//! the whole state; no lock is held across an await point.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use tempest_core::types::{DbId, Timestamp};
use tempest_db::models::capture::{Capture, CaptureLocation, CreateCapture};
use tempest_db::models::dent::{Dent, NewDent};
use tempest_db::models::hailpad::{CreateHailpad, Hailpad};
use tempest_db::models::job::{Job, QueueCounts};
use tempest_db::models::panorama::{Panorama, UpsertPanorama};
use tempest_db::models::path::{CreatePath, Path};
use tempest_db::models::scan::{CreateScan, Scan};
use tempest_db::models::segment::{CreatePathSegment, PathSegment, SegmentRollup};
use tempest_db::models::status::{JobStatus, ProcessStatus, ServiceStatus};

use super::{EntityStore, JobQueue, StoreError};
use crate::task::{QueueName, Task};

#[derive(Default)]
struct Inner {
    next_id: DbId,
    captures: HashMap<DbId, Capture>,
    paths: HashMap<DbId, Path>,
    segments: HashMap<DbId, PathSegment>,
    panoramas: HashMap<DbId, Panorama>,
    hailpads: HashMap<DbId, Hailpad>,
    dents: HashMap<DbId, Vec<Dent>>,
    scans: HashMap<DbId, Scan>,
    jobs: HashMap<DbId, Job>,
}

impl Inner {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// Hash-map implementation of both storage ports.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn now() -> Timestamp {
    Utc::now()
}

fn process_terminal(status_id: i16) -> bool {
    ProcessStatus::from_id(status_id).is_some_and(|s| s.is_terminal())
}

#[async_trait]
impl EntityStore for MemoryStore {
    // -- captures --

    async fn create_capture(&self, input: CreateCapture) -> Result<Capture, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id();
        let capture = Capture {
            id,
            file_name: input.file_name,
            source_id: input.source_id,
            size_bytes: input.size_bytes,
            status_id: ServiceStatus::Pending.id(),
            created_at: now(),
            updated_at: now(),
        };
        inner.captures.insert(id, capture.clone());
        Ok(capture)
    }

    async fn capture(&self, id: DbId) -> Result<Option<Capture>, StoreError> {
        Ok(self.inner.lock().await.captures.get(&id).cloned())
    }

    async fn set_capture_status(&self, id: DbId, status: ServiceStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(capture) = inner.captures.get_mut(&id) {
            capture.status_id = status.id();
            capture.updated_at = now();
        }
        Ok(())
    }

    async fn capture_location(&self, id: DbId) -> Result<Option<CaptureLocation>, StoreError> {
        let inner = self.inner.lock().await;
        let segment = inner
            .segments
            .values()
            .find(|s| s.capture_id == id || s.street_view_capture_id == Some(id));
        Ok(segment.and_then(|s| {
            inner.paths.get(&s.path_id).map(|p| CaptureLocation {
                path_id: p.id,
                folder: p.folder.clone(),
            })
        }))
    }

    // -- paths --

    async fn create_path(&self, input: CreatePath) -> Result<Path, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id();
        let path = Path {
            id,
            name: input.name,
            folder: input.folder,
            status_id: ProcessStatus::Pending.id(),
            size_bytes: 0,
            created_at: now(),
            updated_at: now(),
        };
        inner.paths.insert(id, path.clone());
        Ok(path)
    }

    async fn path(&self, id: DbId) -> Result<Option<Path>, StoreError> {
        Ok(self.inner.lock().await.paths.get(&id).cloned())
    }

    async fn set_path_status(&self, id: DbId, status: ProcessStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(path) = inner.paths.get_mut(&id) {
            path.status_id = status.id();
            path.updated_at = now();
        }
        Ok(())
    }

    async fn complete_path_if_active(
        &self,
        id: DbId,
        size_bytes: i64,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.paths.get_mut(&id) {
            Some(path) if !process_terminal(path.status_id) => {
                path.status_id = ProcessStatus::Complete.id();
                path.size_bytes = size_bytes;
                path.updated_at = now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail_path_if_active(&self, id: DbId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.paths.get_mut(&id) {
            Some(path) if !process_terminal(path.status_id) => {
                path.status_id = ProcessStatus::Failed.id();
                path.updated_at = now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reset_path_rows(&self, id: DbId) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock().await;
        let segment_ids: Vec<DbId> = inner
            .segments
            .values()
            .filter(|s| s.path_id == id)
            .map(|s| s.id)
            .collect();
        let mut capture_ids = Vec::new();
        for segment_id in &segment_ids {
            if let Some(segment) = inner.segments.remove(segment_id) {
                capture_ids.push(segment.capture_id);
                if let Some(sv) = segment.street_view_capture_id {
                    capture_ids.push(sv);
                }
            }
        }
        let mut file_names = Vec::new();
        for capture_id in capture_ids {
            if let Some(capture) = inner.captures.remove(&capture_id) {
                file_names.push(capture.file_name);
            }
        }
        if let Some(path) = inner.paths.get_mut(&id) {
            path.status_id = ProcessStatus::Pending.id();
            path.size_bytes = 0;
            path.updated_at = now();
        }
        Ok(file_names)
    }

    // -- segments --

    async fn create_segment(&self, input: CreatePathSegment) -> Result<PathSegment, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id();
        let segment = PathSegment {
            id,
            path_id: input.path_id,
            sequence_index: input.sequence_index,
            capture_id: input.capture_id,
            street_view_capture_id: None,
            panorama_id: None,
            panorama_status_id: ProcessStatus::Pending.id(),
            lat: input.lat,
            lng: input.lng,
            created_at: now(),
            updated_at: now(),
        };
        inner.segments.insert(id, segment.clone());
        Ok(segment)
    }

    async fn segment(&self, id: DbId) -> Result<Option<PathSegment>, StoreError> {
        Ok(self.inner.lock().await.segments.get(&id).cloned())
    }

    async fn segment_rollups(&self, path_id: DbId) -> Result<Vec<SegmentRollup>, StoreError> {
        let inner = self.inner.lock().await;
        let mut segments: Vec<&PathSegment> = inner
            .segments
            .values()
            .filter(|s| s.path_id == path_id)
            .collect();
        segments.sort_by_key(|s| s.sequence_index);
        let mut rollups = Vec::with_capacity(segments.len());
        for segment in segments {
            let Some(capture) = inner.captures.get(&segment.capture_id) else {
                continue;
            };
            let street_view = segment
                .street_view_capture_id
                .and_then(|id| inner.captures.get(&id));
            rollups.push(SegmentRollup {
                segment_id: segment.id,
                panorama_status_id: segment.panorama_status_id,
                panorama_id: segment.panorama_id,
                capture_status_id: capture.status_id,
                capture_size_bytes: capture.size_bytes,
                street_view_status_id: street_view.map(|c| c.status_id),
                street_view_size_bytes: street_view.map(|c| c.size_bytes),
            });
        }
        Ok(rollups)
    }

    async fn set_segment_panorama_status(
        &self,
        id: DbId,
        status: ProcessStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(segment) = inner.segments.get_mut(&id) {
            segment.panorama_status_id = status.id();
            segment.updated_at = now();
        }
        Ok(())
    }

    async fn link_segment_panorama(&self, id: DbId, panorama_id: DbId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(segment) = inner.segments.get_mut(&id) {
            segment.panorama_id = Some(panorama_id);
            segment.panorama_status_id = ProcessStatus::Complete.id();
            segment.updated_at = now();
        }
        Ok(())
    }

    async fn set_segment_street_view(
        &self,
        id: DbId,
        capture_id: DbId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(segment) = inner.segments.get_mut(&id) {
            segment.street_view_capture_id = Some(capture_id);
            segment.updated_at = now();
        }
        Ok(())
    }

    // -- panoramas --

    async fn upsert_panorama(&self, input: UpsertPanorama) -> Result<Panorama, StoreError> {
        let mut inner = self.inner.lock().await;
        let existing = inner
            .panoramas
            .values()
            .find(|p| p.external_id == input.external_id)
            .map(|p| p.id);
        if let Some(id) = existing {
            let panorama = inner
                .panoramas
                .get_mut(&id)
                .ok_or_else(|| StoreError::Internal("panorama vanished during upsert".into()))?;
            panorama.lat = input.lat;
            panorama.lng = input.lng;
            panorama.heading = input.heading;
            panorama.pitch = input.pitch;
            panorama.roll = input.roll;
            panorama.captured_on = input.captured_on;
            panorama.elevation = input.elevation;
            panorama.updated_at = now();
            return Ok(panorama.clone());
        }
        let id = inner.next_id();
        let panorama = Panorama {
            id,
            external_id: input.external_id,
            lat: input.lat,
            lng: input.lng,
            heading: input.heading,
            pitch: input.pitch,
            roll: input.roll,
            captured_on: input.captured_on,
            elevation: input.elevation,
            created_at: now(),
            updated_at: now(),
        };
        inner.panoramas.insert(id, panorama.clone());
        Ok(panorama)
    }

    // -- hailpads --

    async fn create_hailpad(&self, input: CreateHailpad) -> Result<Hailpad, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id();
        let hailpad = Hailpad {
            id,
            name: input.name,
            folder: input.folder,
            file_name: input.file_name,
            depth_map_status_id: ServiceStatus::Pending.id(),
            analysis_status_id: ServiceStatus::Pending.id(),
            status_id: ProcessStatus::Pending.id(),
            boxfit: None,
            max_depth: None,
            created_at: now(),
            updated_at: now(),
        };
        inner.hailpads.insert(id, hailpad.clone());
        Ok(hailpad)
    }

    async fn hailpad(&self, id: DbId) -> Result<Option<Hailpad>, StoreError> {
        Ok(self.inner.lock().await.hailpads.get(&id).cloned())
    }

    async fn set_depth_map_status(
        &self,
        id: DbId,
        status: ServiceStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(hailpad) = inner.hailpads.get_mut(&id) {
            hailpad.depth_map_status_id = status.id();
            hailpad.updated_at = now();
        }
        Ok(())
    }

    async fn set_analysis_status(
        &self,
        id: DbId,
        status: ServiceStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(hailpad) = inner.hailpads.get_mut(&id) {
            hailpad.analysis_status_id = status.id();
            hailpad.updated_at = now();
        }
        Ok(())
    }

    async fn set_hailpad_boxfit(&self, id: DbId, boxfit: f64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(hailpad) = inner.hailpads.get_mut(&id) {
            hailpad.boxfit = Some(boxfit);
            hailpad.updated_at = now();
        }
        Ok(())
    }

    async fn set_hailpad_max_depth(&self, id: DbId, max_depth: f64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(hailpad) = inner.hailpads.get_mut(&id) {
            hailpad.max_depth = Some(max_depth);
            hailpad.updated_at = now();
        }
        Ok(())
    }

    async fn complete_hailpad_if_active(&self, id: DbId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.hailpads.get_mut(&id) {
            Some(hailpad) if !process_terminal(hailpad.status_id) => {
                hailpad.status_id = ProcessStatus::Complete.id();
                hailpad.updated_at = now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail_hailpad_if_active(&self, id: DbId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.hailpads.get_mut(&id) {
            Some(hailpad) if !process_terminal(hailpad.status_id) => {
                hailpad.status_id = ProcessStatus::Failed.id();
                hailpad.updated_at = now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn replace_dents(
        &self,
        hailpad_id: DbId,
        dents: Vec<NewDent>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let rows: Vec<Dent> = dents
            .into_iter()
            .map(|d| {
                let id = inner.next_id();
                Dent {
                    id,
                    hailpad_id,
                    angle: d.angle,
                    centroid_x: d.centroid_x,
                    centroid_y: d.centroid_y,
                    major_axis: d.major_axis,
                    minor_axis: d.minor_axis,
                    max_depth: d.max_depth,
                    created_at: now(),
                    updated_at: now(),
                }
            })
            .collect();
        inner.dents.insert(hailpad_id, rows);
        if let Some(hailpad) = inner.hailpads.get_mut(&hailpad_id) {
            hailpad.analysis_status_id = ServiceStatus::Complete.id();
            hailpad.updated_at = now();
        }
        Ok(())
    }

    async fn dents(&self, hailpad_id: DbId) -> Result<Vec<Dent>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .dents
            .get(&hailpad_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn reset_hailpad_rows(&self, id: DbId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.dents.remove(&id);
        if let Some(hailpad) = inner.hailpads.get_mut(&id) {
            hailpad.depth_map_status_id = ServiceStatus::Pending.id();
            hailpad.analysis_status_id = ServiceStatus::Pending.id();
            hailpad.status_id = ProcessStatus::Pending.id();
            hailpad.updated_at = now();
        }
        Ok(())
    }

    // -- scans --

    async fn create_scan(&self, input: CreateScan) -> Result<Scan, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id();
        let scan = Scan {
            id,
            name: input.name,
            file_name: input.file_name,
            size_bytes: input.size_bytes,
            status_id: ProcessStatus::Pending.id(),
            created_at: now(),
            updated_at: now(),
        };
        inner.scans.insert(id, scan.clone());
        Ok(scan)
    }

    async fn scan(&self, id: DbId) -> Result<Option<Scan>, StoreError> {
        Ok(self.inner.lock().await.scans.get(&id).cloned())
    }

    async fn set_scan_status(&self, id: DbId, status: ProcessStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(scan) = inner.scans.get_mut(&id) {
            scan.status_id = status.id();
            scan.updated_at = now();
        }
        Ok(())
    }
}

#[async_trait]
impl JobQueue for MemoryStore {
    async fn enqueue(&self, task: &Task) -> Result<Job, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id();
        let job = Job {
            id,
            queue: task.queue().as_str().to_string(),
            payload: task.payload(),
            status_id: JobStatus::Pending.id(),
            attempts: 0,
            last_error: None,
            submitted_at: now(),
            claimed_at: None,
            completed_at: None,
            created_at: now(),
            updated_at: now(),
        };
        inner.jobs.insert(id, job.clone());
        Ok(job)
    }

    async fn claim(&self, queue: QueueName) -> Result<Option<Job>, StoreError> {
        let mut inner = self.inner.lock().await;
        let next = inner
            .jobs
            .values()
            .filter(|j| j.queue == queue.as_str() && j.status_id == JobStatus::Pending.id())
            .min_by_key(|j| (j.submitted_at, j.id))
            .map(|j| j.id);
        let Some(id) = next else { return Ok(None) };
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::Internal("job vanished during claim".into()))?;
        job.status_id = JobStatus::Running.id();
        job.claimed_at = Some(now());
        job.attempts += 1;
        job.updated_at = now();
        Ok(Some(job.clone()))
    }

    async fn complete_job(&self, job_id: DbId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            job.status_id = JobStatus::Completed.id();
            job.completed_at = Some(now());
            job.updated_at = now();
        }
        Ok(())
    }

    async fn fail_job(&self, job_id: DbId, error: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            job.status_id = JobStatus::Failed.id();
            job.last_error = Some(error.to_string());
            job.completed_at = Some(now());
            job.updated_at = now();
        }
        Ok(())
    }

    async fn release_stale(&self, older_than: Duration) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let cutoff = now();
        let mut released = 0;
        for job in inner.jobs.values_mut() {
            if job.status_id != JobStatus::Running.id() {
                continue;
            }
            let stale = job
                .claimed_at
                .is_some_and(|t| (cutoff - t).to_std().is_ok_and(|age| age >= older_than));
            if stale {
                job.status_id = JobStatus::Pending.id();
                job.claimed_at = None;
                job.updated_at = now();
                released += 1;
            }
        }
        Ok(released)
    }

    async fn job(&self, job_id: DbId) -> Result<Option<Job>, StoreError> {
        Ok(self.inner.lock().await.jobs.get(&job_id).cloned())
    }

    async fn counts(&self, queue: QueueName) -> Result<QueueCounts, StoreError> {
        let inner = self.inner.lock().await;
        let mut counts = QueueCounts::default();
        for job in inner.jobs.values().filter(|j| j.queue == queue.as_str()) {
            match JobStatus::from_id(job.status_id) {
                Some(JobStatus::Pending) => counts.pending += 1,
                Some(JobStatus::Running) => counts.running += 1,
                Some(JobStatus::Completed) => counts.completed += 1,
                Some(JobStatus::Failed) => counts.failed += 1,
                None => {}
            }
        }
        Ok(counts)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

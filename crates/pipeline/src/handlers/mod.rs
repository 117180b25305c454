//! Per-queue task handlers and the dispatching [`Pipeline`].
//!
//! Handlers follow one shape: idempotency check, mark in-flight, do the
//! work, mark terminal, then maybe run the completion aggregator.
//! Business failures (a rejected API call, a non-zero converter exit)
//! are job outcomes, reported as `WorkerResult::failed` after the
//! entity's terminal status is written. Only infrastructure the handler
//! cannot resolve (storage, local I/O) escapes as [`HandlerError`] and
//! trips the harness safety net.

use std::sync::Arc;

use async_trait::async_trait;
use tempest_db::models::status::{ProcessStatus, ServiceStatus};

use crate::aggregate;
use crate::context::PipelineContext;
use crate::store::StoreError;
use crate::task::{Task, WorkerResult};

pub mod analysis;
pub mod blur;
pub mod depth_map;
pub mod point_cloud;
pub mod street_view;

/// Errors a handler cannot turn into a job outcome on its own.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The harness-facing handler seam.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Execute one task to a job outcome.
    async fn handle(&self, task: &Task) -> Result<WorkerResult, HandlerError>;

    /// Best-effort terminal write after a panic or [`HandlerError`], so
    /// no entity is left stuck in an in-flight status. Every error here
    /// is logged and swallowed.
    async fn fail_entity(&self, task: &Task);
}

/// Dispatches tasks to the per-queue handler modules.
pub struct Pipeline {
    ctx: Arc<PipelineContext>,
}

impl Pipeline {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl TaskHandler for Pipeline {
    async fn handle(&self, task: &Task) -> Result<WorkerResult, HandlerError> {
        match *task {
            Task::Blur { capture_id } => blur::handle(&self.ctx, capture_id).await,
            Task::PanoramaLookup { segment_id } => {
                street_view::handle(&self.ctx, segment_id).await
            }
            Task::PointCloud { scan_id } => point_cloud::handle(&self.ctx, scan_id).await,
            Task::DepthMap { hailpad_id } => depth_map::handle(&self.ctx, hailpad_id).await,
            Task::HailpadAnalysis { hailpad_id } => {
                analysis::handle(&self.ctx, hailpad_id).await
            }
        }
    }

    async fn fail_entity(&self, task: &Task) {
        let store = self.ctx.store.as_ref();
        match *task {
            Task::Blur { capture_id } => {
                if let Err(err) = store
                    .set_capture_status(capture_id, ServiceStatus::Failed)
                    .await
                {
                    tracing::error!(capture_id, error = %err, "Failed to mark capture failed");
                    return;
                }
                match store.capture_location(capture_id).await {
                    Ok(Some(location)) => {
                        if let Err(err) =
                            aggregate::check_path_complete(store, location.path_id).await
                        {
                            tracing::error!(
                                path_id = location.path_id,
                                error = %err,
                                "Aggregation after capture failure failed",
                            );
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::error!(capture_id, error = %err, "Capture location lookup failed");
                    }
                }
            }
            Task::PanoramaLookup { segment_id } => {
                if let Err(err) = store
                    .set_segment_panorama_status(segment_id, ProcessStatus::Failed)
                    .await
                {
                    tracing::error!(segment_id, error = %err, "Failed to mark lookup failed");
                    return;
                }
                match store.segment(segment_id).await {
                    Ok(Some(segment)) => {
                        if let Err(err) =
                            aggregate::check_path_complete(store, segment.path_id).await
                        {
                            tracing::error!(
                                path_id = segment.path_id,
                                error = %err,
                                "Aggregation after lookup failure failed",
                            );
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::error!(segment_id, error = %err, "Segment lookup failed");
                    }
                }
            }
            Task::PointCloud { scan_id } => {
                if let Err(err) = store.set_scan_status(scan_id, ProcessStatus::Failed).await {
                    tracing::error!(scan_id, error = %err, "Failed to mark scan failed");
                }
            }
            Task::DepthMap { hailpad_id } => {
                if let Err(err) = store
                    .set_depth_map_status(hailpad_id, ServiceStatus::Failed)
                    .await
                {
                    tracing::error!(hailpad_id, error = %err, "Failed to mark depth map failed");
                    return;
                }
                if let Err(err) = aggregate::check_hailpad_complete(store, hailpad_id).await {
                    tracing::error!(hailpad_id, error = %err, "Hailpad completion check failed");
                }
            }
            Task::HailpadAnalysis { hailpad_id } => {
                if let Err(err) = store
                    .set_analysis_status(hailpad_id, ServiceStatus::Failed)
                    .await
                {
                    tracing::error!(hailpad_id, error = %err, "Failed to mark analysis failed");
                    return;
                }
                if let Err(err) = aggregate::check_hailpad_complete(store, hailpad_id).await {
                    tracing::error!(hailpad_id, error = %err, "Hailpad completion check failed");
                }
            }
        }
    }
}

//! Depth-map queue handler: render a hailpad scan into `dmap.png` via
//! the analysis service's upload+poll protocol.

use tempest_compute::{ComputeError, StatusResponse};
use tempest_core::types::DbId;
use tempest_db::models::status::ServiceStatus;

use super::HandlerError;
use crate::aggregate;
use crate::context::PipelineContext;
use crate::task::WorkerResult;

pub async fn handle(
    ctx: &PipelineContext,
    hailpad_id: DbId,
) -> Result<WorkerResult, HandlerError> {
    let store = ctx.store.as_ref();

    let Some(hailpad) = store.hailpad(hailpad_id).await? else {
        tracing::warn!(hailpad_id, "Depth-map job for missing hailpad");
        return Ok(WorkerResult::failed("hailpad not found"));
    };

    if ServiceStatus::from_id(hailpad.depth_map_status_id) == Some(ServiceStatus::Complete) {
        tracing::info!(hailpad_id, "Depth map already rendered, skipping");
        return Ok(WorkerResult::ok());
    }

    let scan_file = ctx.layout.hailpad_file(&hailpad.folder, &hailpad.file_name);
    let bytes = match tokio::fs::read(&scan_file).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::error!(hailpad_id, file = %scan_file.display(), "Hailpad scan missing on disk");
            return Ok(WorkerResult::failed("scan file missing"));
        }
        Err(err) => return Err(err.into()),
    };

    store
        .set_depth_map_status(hailpad_id, ServiceStatus::Uploading)
        .await?;

    let task_id = match ctx.analysis.upload(&hailpad.file_name, bytes).await {
        Ok(task_id) => task_id,
        Err(err) => return fail_stage(ctx, hailpad_id, "upload", err).await,
    };

    store
        .set_depth_map_status(hailpad_id, ServiceStatus::Processing)
        .await?;

    if let Err(err) = ctx
        .analysis
        .poll_status(&task_id, StatusResponse::is_settled, ctx.poll)
        .await
    {
        return fail_stage(ctx, hailpad_id, "processing", err).await;
    }

    let png = match ctx.analysis.fetch_depth_map(&task_id).await {
        Ok(png) => png,
        Err(err) => return fail_stage(ctx, hailpad_id, "result fetch", err).await,
    };

    tokio::fs::write(ctx.layout.depth_map_file(&hailpad.folder), &png).await?;

    store
        .set_depth_map_status(hailpad_id, ServiceStatus::Complete)
        .await?;
    aggregate::check_hailpad_complete(store, hailpad_id).await?;
    tracing::info!(hailpad_id, bytes = png.len(), "Depth map rendered");
    Ok(WorkerResult::ok())
}

/// Mark the depth-map stage failed, surface it on the hailpad, and turn
/// the service error into a job outcome.
async fn fail_stage(
    ctx: &PipelineContext,
    hailpad_id: DbId,
    stage: &str,
    err: ComputeError,
) -> Result<WorkerResult, HandlerError> {
    tracing::error!(hailpad_id, stage, error = %err, "Depth map failed");
    let store = ctx.store.as_ref();
    store
        .set_depth_map_status(hailpad_id, ServiceStatus::Failed)
        .await?;
    aggregate::check_hailpad_complete(store, hailpad_id).await?;
    Ok(WorkerResult::failed(format!("depth map {stage} failed: {err}")))
}

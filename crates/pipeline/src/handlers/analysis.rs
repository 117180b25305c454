//! Hailpad-analysis queue handler: detect dents via the analysis
//! service's upload+poll protocol and replace the stored dent set.

use tempest_compute::{ComputeError, StatusResponse};
use tempest_core::types::DbId;
use tempest_db::models::dent::NewDent;
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
        tracing::warn!(hailpad_id, "Analysis job for missing hailpad");
        return Ok(WorkerResult::failed("hailpad not found"));
    };

    if ServiceStatus::from_id(hailpad.analysis_status_id) == Some(ServiceStatus::Complete) {
        tracing::info!(hailpad_id, "Analysis already complete, skipping");
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
        .set_analysis_status(hailpad_id, ServiceStatus::Uploading)
        .await?;

    let task_id = match ctx.analysis.upload(&hailpad.file_name, bytes).await {
        Ok(task_id) => task_id,
        Err(err) => return fail_stage(ctx, hailpad_id, "upload", err).await,
    };

    store
        .set_analysis_status(hailpad_id, ServiceStatus::Processing)
        .await?;

    if let Err(err) = ctx
        .analysis
        .poll_status(&task_id, StatusResponse::is_settled, ctx.poll)
        .await
    {
        return fail_stage(ctx, hailpad_id, "processing", err).await;
    }

    let result = match ctx.analysis.fetch_analysis(&task_id).await {
        Ok(result) => result,
        Err(err) => return fail_stage(ctx, hailpad_id, "result fetch", err).await,
    };

    let dents: Vec<NewDent> = result
        .dents
        .into_iter()
        .map(|d| NewDent {
            angle: d.angle,
            centroid_x: d.centroid_x,
            centroid_y: d.centroid_y,
            major_axis: d.major_axis,
            minor_axis: d.minor_axis,
            max_depth: d.max_depth,
        })
        .collect();
    let dent_count = dents.len();

    // Replaces the dent set and marks the analysis Complete in one
    // transaction; a redelivered job converges instead of duplicating.
    store.replace_dents(hailpad_id, dents).await?;
    aggregate::check_hailpad_complete(store, hailpad_id).await?;
    tracing::info!(hailpad_id, dent_count, "Dent analysis stored");
    Ok(WorkerResult::ok())
}

/// Mark the analysis stage failed, surface it on the hailpad, and turn
/// the service error into a job outcome.
async fn fail_stage(
    ctx: &PipelineContext,
    hailpad_id: DbId,
    stage: &str,
    err: ComputeError,
) -> Result<WorkerResult, HandlerError> {
    tracing::error!(hailpad_id, stage, error = %err, "Analysis failed");
    let store = ctx.store.as_ref();
    store
        .set_analysis_status(hailpad_id, ServiceStatus::Failed)
        .await?;
    aggregate::check_hailpad_complete(store, hailpad_id).await?;
    Ok(WorkerResult::failed(format!("analysis {stage} failed: {err}")))
}

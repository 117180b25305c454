//! User-triggered cascading resets.
//!
//! A reset is the only sanctioned way a status regresses from a
//! terminal state. The row changes happen in one store transaction;
//! artifact files are removed afterwards best-effort, since a leftover
//! file is harmless while a half-deleted row set is not.

use std::path::PathBuf;

use tempest_core::types::DbId;

use crate::context::PipelineContext;
use crate::store::StoreError;

/// Wipe a path back to Pending: all segments and captures are deleted
/// and their processed files removed from disk.
///
/// Returns `false` when the path does not exist.
pub async fn reset_path(ctx: &PipelineContext, path_id: DbId) -> Result<bool, StoreError> {
    let Some(path) = ctx.store.path(path_id).await? else {
        return Ok(false);
    };

    let orphaned = ctx.store.reset_path_rows(path_id).await?;
    tracing::info!(path_id, captures = orphaned.len(), "Path reset to pending");

    for file_name in &orphaned {
        remove_artifact(ctx.layout.capture_file(&path.folder, file_name)).await;
    }
    Ok(true)
}

/// Wipe a hailpad's processing results back to Pending: dents and the
/// depth-map render are deleted. The uploaded scan and the human
/// calibration (`boxfit`, `max_depth`) survive, so reprocessing needs
/// no re-upload or re-measurement.
///
/// Returns `false` when the hailpad does not exist.
pub async fn reset_hailpad(ctx: &PipelineContext, hailpad_id: DbId) -> Result<bool, StoreError> {
    let Some(hailpad) = ctx.store.hailpad(hailpad_id).await? else {
        return Ok(false);
    };

    ctx.store.reset_hailpad_rows(hailpad_id).await?;
    tracing::info!(hailpad_id, "Hailpad reset to pending");

    remove_artifact(ctx.layout.depth_map_file(&hailpad.folder)).await;
    Ok(true)
}

/// Delete one artifact file, tolerating its absence. A reset may run
/// before the pipeline ever produced the file.
async fn remove_artifact(path: PathBuf) {
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Could not remove artifact file");
        }
    }
}

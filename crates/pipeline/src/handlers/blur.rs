//! Blur queue handler: anonymize one capture image in place.

use std::path::{Path, PathBuf};

use tempest_core::types::DbId;
use tempest_db::models::status::ServiceStatus;

use super::HandlerError;
use crate::aggregate;
use crate::context::PipelineContext;
use crate::task::WorkerResult;

pub async fn handle(
    ctx: &PipelineContext,
    capture_id: DbId,
) -> Result<WorkerResult, HandlerError> {
    let store = ctx.store.as_ref();

    let Some(capture) = store.capture(capture_id).await? else {
        tracing::warn!(capture_id, "Blur job for missing capture");
        return Ok(WorkerResult::failed("capture not found"));
    };

    // Redelivery after a completed run: the artifact is already blurred
    // and must not go through the service a second time.
    if ServiceStatus::from_id(capture.status_id) == Some(ServiceStatus::Complete) {
        tracing::info!(capture_id, "Capture already blurred, skipping");
        return Ok(WorkerResult::ok());
    }

    let Some(location) = store.capture_location(capture_id).await? else {
        store
            .set_capture_status(capture_id, ServiceStatus::Failed)
            .await?;
        return Ok(WorkerResult::failed("capture is not attached to any path"));
    };

    let file = ctx.layout.capture_file(&location.folder, &capture.file_name);
    let bytes = match tokio::fs::read(&file).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            // The row exists but the upload never landed (or was swept).
            // Leave the status as the load found it.
            tracing::error!(capture_id, file = %file.display(), "Capture artifact missing on disk");
            return Ok(WorkerResult::failed("artifact file missing"));
        }
        Err(err) => return Err(err.into()),
    };

    store
        .set_capture_status(capture_id, ServiceStatus::Processing)
        .await?;

    match ctx.blur.blur(&capture.file_name, bytes).await {
        Ok(blurred) => {
            write_atomic(&file, &blurred).await?;
            store
                .set_capture_status(capture_id, ServiceStatus::Complete)
                .await?;
            aggregate::check_path_complete(store, location.path_id).await?;
            tracing::info!(capture_id, path_id = location.path_id, "Capture blurred");
            Ok(WorkerResult::ok())
        }
        Err(err) => {
            tracing::error!(capture_id, error = %err, "Blur service call failed");
            store
                .set_capture_status(capture_id, ServiceStatus::Failed)
                .await?;
            aggregate::check_path_complete(store, location.path_id).await?;
            Ok(WorkerResult::failed(format!("blur failed: {err}")))
        }
    }
}

/// Replace `target` without ever exposing a half-written file: write to
/// a sibling temp file, then rename over the original.
async fn write_atomic(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = target.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, target).await
}

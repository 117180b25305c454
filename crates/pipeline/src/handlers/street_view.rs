//! Panorama-lookup queue handler: find street-view coverage at a
//! segment's coordinates.
//!
//! "No coverage" is a successful terminal outcome, not an error. When
//! the provider does return a panorama, the record is upserted by its
//! external id and linked; the street-view image itself is ingested by
//! the upload surface, so the aggregator holds the path open until that
//! capture exists and settles.

use tempest_core::types::DbId;
use tempest_db::models::panorama::UpsertPanorama;
use tempest_db::models::status::ProcessStatus;

use super::HandlerError;
use crate::aggregate;
use crate::context::PipelineContext;
use crate::task::WorkerResult;

pub async fn handle(
    ctx: &PipelineContext,
    segment_id: DbId,
) -> Result<WorkerResult, HandlerError> {
    let store = ctx.store.as_ref();

    let Some(segment) = store.segment(segment_id).await? else {
        tracing::warn!(segment_id, "Lookup job for missing segment");
        return Ok(WorkerResult::failed("segment not found"));
    };

    // A redelivered job after a completed lookup never re-queries the
    // provider; every provider call costs rate budget.
    if ProcessStatus::from_id(segment.panorama_status_id) == Some(ProcessStatus::Complete) {
        tracing::info!(segment_id, "Panorama lookup already complete, skipping");
        return Ok(WorkerResult::ok());
    }

    store
        .set_segment_panorama_status(segment_id, ProcessStatus::InProgress)
        .await?;

    match ctx.street_view.find_panorama(segment.lat, segment.lng).await {
        Ok(None) => {
            store
                .set_segment_panorama_status(segment_id, ProcessStatus::Complete)
                .await?;
            aggregate::check_path_complete(store, segment.path_id).await?;
            tracing::info!(
                segment_id,
                lat = segment.lat,
                lng = segment.lng,
                "No panorama coverage at segment",
            );
            Ok(WorkerResult::ok_with("no panorama coverage"))
        }
        Ok(Some(metadata)) => {
            let panorama = store
                .upsert_panorama(UpsertPanorama {
                    external_id: metadata.id,
                    lat: metadata.lat,
                    lng: metadata.lon,
                    heading: metadata.heading,
                    pitch: metadata.pitch,
                    roll: metadata.roll,
                    captured_on: metadata.date,
                    elevation: metadata.elevation,
                })
                .await?;
            store.link_segment_panorama(segment_id, panorama.id).await?;
            aggregate::check_path_complete(store, segment.path_id).await?;
            tracing::info!(
                segment_id,
                panorama_id = panorama.id,
                external_id = %panorama.external_id,
                "Panorama linked to segment",
            );
            Ok(WorkerResult::ok())
        }
        Err(err) => {
            tracing::error!(segment_id, error = %err, "Panorama provider call failed");
            store
                .set_segment_panorama_status(segment_id, ProcessStatus::Failed)
                .await?;
            aggregate::check_path_complete(store, segment.path_id).await?;
            Ok(WorkerResult::failed(format!("panorama lookup failed: {err}")))
        }
    }
}

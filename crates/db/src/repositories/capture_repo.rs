//! Repository for the `captures` table.

use sqlx::PgPool;
use tempest_core::types::DbId;

use crate::models::capture::{Capture, CaptureLocation, CreateCapture};
use crate::models::status::{ServiceStatus, StatusId};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, file_name, source_id, size_bytes, status_id, created_at, updated_at";

/// Provides CRUD operations for captures.
pub struct CaptureRepo;

impl CaptureRepo {
    /// Insert a new pending capture, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateCapture) -> Result<Capture, sqlx::Error> {
        let query = format!(
            "INSERT INTO captures (file_name, source_id, size_bytes, status_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Capture>(&query)
            .bind(&input.file_name)
            .bind(input.source_id)
            .bind(input.size_bytes)
            .bind(ServiceStatus::Pending.id())
            .fetch_one(pool)
            .await
    }

    /// Find a capture by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Capture>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM captures WHERE id = $1");
        sqlx::query_as::<_, Capture>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Set a capture's blur sub-status.
    pub async fn set_status(
        pool: &PgPool,
        id: DbId,
        status: StatusId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE captures SET status_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Resolve the path and folder a capture's artifact lives under.
    ///
    /// Matches the capture whether it is a segment's primary capture or
    /// its street-view capture. `None` when the capture is not linked to
    /// any segment yet.
    pub async fn find_location(
        pool: &PgPool,
        capture_id: DbId,
    ) -> Result<Option<CaptureLocation>, sqlx::Error> {
        sqlx::query_as::<_, CaptureLocation>(
            "SELECT p.id AS path_id, p.folder \
             FROM path_segments s \
             JOIN paths p ON p.id = s.path_id \
             WHERE s.capture_id = $1 OR s.street_view_capture_id = $1 \
             LIMIT 1",
        )
        .bind(capture_id)
        .fetch_optional(pool)
        .await
    }
}

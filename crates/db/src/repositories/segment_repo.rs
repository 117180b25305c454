//! Repository for the `path_segments` table.

use sqlx::PgPool;
use tempest_core::types::DbId;

use crate::models::segment::{CreatePathSegment, PathSegment, SegmentRollup};
use crate::models::status::{ProcessStatus, StatusId};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, path_id, sequence_index, capture_id, street_view_capture_id, \
    panorama_id, panorama_status_id, lat, lng, created_at, updated_at";

/// Provides CRUD operations for path segments.
pub struct SegmentRepo;

impl SegmentRepo {
    /// Insert a new segment with a pending panorama lookup, returning the
    /// created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreatePathSegment,
    ) -> Result<PathSegment, sqlx::Error> {
        let query = format!(
            "INSERT INTO path_segments \
                (path_id, sequence_index, capture_id, panorama_status_id, lat, lng) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PathSegment>(&query)
            .bind(input.path_id)
            .bind(input.sequence_index)
            .bind(input.capture_id)
            .bind(ProcessStatus::Pending.id())
            .bind(input.lat)
            .bind(input.lng)
            .fetch_one(pool)
            .await
    }

    /// Find a segment by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PathSegment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM path_segments WHERE id = $1");
        sqlx::query_as::<_, PathSegment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all segments of a path, ordered by sequence index ascending.
    pub async fn list_by_path(pool: &PgPool, path_id: DbId) -> Result<Vec<PathSegment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM path_segments \
             WHERE path_id = $1 \
             ORDER BY sequence_index ASC"
        );
        sqlx::query_as::<_, PathSegment>(&query)
            .bind(path_id)
            .fetch_all(pool)
            .await
    }

    /// Set a segment's panorama lookup status.
    pub async fn set_panorama_status(
        pool: &PgPool,
        id: DbId,
        status: StatusId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE path_segments SET panorama_status_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Link a found panorama to a segment and mark the lookup Complete.
    pub async fn link_panorama(
        pool: &PgPool,
        id: DbId,
        panorama_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE path_segments \
             SET panorama_id = $2, panorama_status_id = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(panorama_id)
        .bind(ProcessStatus::Complete.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Attach a downloaded street-view capture to a segment.
    pub async fn set_street_view_capture(
        pool: &PgPool,
        id: DbId,
        capture_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE path_segments \
             SET street_view_capture_id = $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(capture_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// One-query completion snapshot of a whole path: every segment with
    /// its capture statuses and sizes, street-view capture included when
    /// linked.
    pub async fn list_rollup(pool: &PgPool, path_id: DbId) -> Result<Vec<SegmentRollup>, sqlx::Error> {
        sqlx::query_as::<_, SegmentRollup>(
            "SELECT s.id AS segment_id, s.panorama_status_id, s.panorama_id, \
                    c.status_id AS capture_status_id, \
                    c.size_bytes AS capture_size_bytes, \
                    sv.status_id AS street_view_status_id, \
                    sv.size_bytes AS street_view_size_bytes \
             FROM path_segments s \
             JOIN captures c ON c.id = s.capture_id \
             LEFT JOIN captures sv ON sv.id = s.street_view_capture_id \
             WHERE s.path_id = $1 \
             ORDER BY s.sequence_index ASC",
        )
        .bind(path_id)
        .fetch_all(pool)
        .await
    }
}

//! Path segment entity models for the `path_segments` table.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tempest_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `path_segments` table: one position along a path.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PathSegment {
    pub id: DbId,
    pub path_id: DbId,
    /// Position within the path, unique per path.
    pub sequence_index: i32,
    /// The primary device capture at this position.
    pub capture_id: DbId,
    /// Street-view derived capture, present once downloaded.
    pub street_view_capture_id: Option<DbId>,
    /// Linked panorama record, present when the lookup found coverage.
    pub panorama_id: Option<DbId>,
    /// Lookup stage status. Complete with no `panorama_id` means the
    /// provider reported no coverage at these coordinates.
    pub panorama_status_id: StatusId,
    pub lat: f64,
    pub lng: f64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a new segment row.
#[derive(Debug, Deserialize)]
pub struct CreatePathSegment {
    pub path_id: DbId,
    pub sequence_index: i32,
    pub capture_id: DbId,
    pub lat: f64,
    pub lng: f64,
}

/// One segment's completion-relevant columns, joined with its captures.
///
/// Produced in a single query so the aggregator evaluates a consistent
/// snapshot of the whole path.
#[derive(Debug, Clone, FromRow)]
pub struct SegmentRollup {
    pub segment_id: DbId,
    pub panorama_status_id: StatusId,
    /// Set when the lookup found coverage. A linked panorama whose
    /// street-view capture has not been created yet keeps the path open.
    pub panorama_id: Option<DbId>,
    pub capture_status_id: StatusId,
    pub capture_size_bytes: i64,
    pub street_view_status_id: Option<StatusId>,
    pub street_view_size_bytes: Option<i64>,
}

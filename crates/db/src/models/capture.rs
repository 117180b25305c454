//! Capture entity models for the `captures` table.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tempest_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `captures` table: one uploaded 360° image.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Capture {
    pub id: DbId,
    /// Content-addressed file name (SHA-256 hex plus original extension).
    pub file_name: String,
    /// Origin lookup: 1 = device upload, 2 = street-view panorama.
    pub source_id: i16,
    pub size_bytes: i64,
    pub status_id: StatusId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a new capture row.
#[derive(Debug, Deserialize)]
pub struct CreateCapture {
    pub file_name: String,
    pub source_id: i16,
    pub size_bytes: i64,
}

/// Where a capture's artifact lives: the owning path and its folder.
#[derive(Debug, Clone, FromRow)]
pub struct CaptureLocation {
    pub path_id: DbId,
    pub folder: String,
}

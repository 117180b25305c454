//! Scan entity models for the `scans` table.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tempest_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `scans` table: one uploaded LiDAR point cloud.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Scan {
    pub id: DbId,
    pub name: String,
    /// Content-addressed file name under `scans/`.
    pub file_name: String,
    pub size_bytes: i64,
    pub status_id: StatusId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a new scan row.
#[derive(Debug, Deserialize)]
pub struct CreateScan {
    pub name: String,
    pub file_name: String,
    pub size_bytes: i64,
}

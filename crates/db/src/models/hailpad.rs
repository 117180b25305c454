//! Hailpad entity models for the `hailpads` table.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tempest_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `hailpads` table: one scanned specimen.
///
/// Two independent service stages (depth map, dent analysis) each carry
/// their own sub-status; `status_id` is the overall status and is only
/// promoted once both stages finish and the human calibration
/// (`max_depth`) has been supplied.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Hailpad {
    pub id: DbId,
    pub name: String,
    /// Content-addressed directory name under `hailpads/`.
    pub folder: String,
    /// Hashed file name of the uploaded scan inside `folder`.
    pub file_name: String,
    pub depth_map_status_id: StatusId,
    pub analysis_status_id: StatusId,
    pub status_id: StatusId,
    /// Human-entered box-fitting scale. Survives a reprocess.
    pub boxfit: Option<f64>,
    /// Human-entered calibration depth in millimetres. Positive once set.
    pub max_depth: Option<f64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a new hailpad row.
#[derive(Debug, Deserialize)]
pub struct CreateHailpad {
    pub name: String,
    pub folder: String,
    pub file_name: String,
}

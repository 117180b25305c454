//! Dent entity models for the `dents` table.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tempest_core::types::{DbId, Timestamp};

/// A row from the `dents` table: one detected dent on a hailpad.
///
/// The full set for a hailpad is replaced wholesale on every successful
/// analysis run.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Dent {
    pub id: DbId,
    pub hailpad_id: DbId,
    pub angle: f64,
    pub centroid_x: f64,
    pub centroid_y: f64,
    pub major_axis: f64,
    pub minor_axis: f64,
    pub max_depth: f64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for one dent in a replacement batch.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDent {
    pub angle: f64,
    pub centroid_x: f64,
    pub centroid_y: f64,
    pub major_axis: f64,
    pub minor_axis: f64,
    pub max_depth: f64,
}

//! Panorama entity models for the `panoramas` table.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tempest_core::types::{DbId, Timestamp};

/// A row from the `panoramas` table: one street-view panorama record.
///
/// Rows are upserted by `external_id`; several segments may link the
/// same panorama.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Panorama {
    pub id: DbId,
    /// Provider-assigned panorama ID, unique.
    pub external_id: String,
    pub lat: f64,
    pub lng: f64,
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
    /// Capture date as reported by the provider, when known.
    pub captured_on: Option<String>,
    pub elevation: Option<f64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for upserting a panorama by its external ID.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertPanorama {
    pub external_id: String,
    pub lat: f64,
    pub lng: f64,
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
    pub captured_on: Option<String>,
    pub elevation: Option<f64>,
}

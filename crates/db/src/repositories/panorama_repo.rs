//! Repository for the `panoramas` table.

use sqlx::PgPool;
use tempest_core::types::DbId;

use crate::models::panorama::{Panorama, UpsertPanorama};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, external_id, lat, lng, heading, pitch, roll, captured_on, \
    elevation, created_at, updated_at";

/// Provides CRUD operations for panoramas.
pub struct PanoramaRepo;

impl PanoramaRepo {
    /// Insert or refresh a panorama by its provider ID, returning the row.
    ///
    /// Lookups at nearby coordinates can resolve to the same panorama, so
    /// the provider ID is the identity and metadata is refreshed in place.
    pub async fn upsert_by_external_id(
        pool: &PgPool,
        input: &UpsertPanorama,
    ) -> Result<Panorama, sqlx::Error> {
        let query = format!(
            "INSERT INTO panoramas \
                (external_id, lat, lng, heading, pitch, roll, captured_on, elevation) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (external_id) DO UPDATE SET \
                lat = EXCLUDED.lat, \
                lng = EXCLUDED.lng, \
                heading = EXCLUDED.heading, \
                pitch = EXCLUDED.pitch, \
                roll = EXCLUDED.roll, \
                captured_on = EXCLUDED.captured_on, \
                elevation = EXCLUDED.elevation, \
                updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Panorama>(&query)
            .bind(&input.external_id)
            .bind(input.lat)
            .bind(input.lng)
            .bind(input.heading)
            .bind(input.pitch)
            .bind(input.roll)
            .bind(&input.captured_on)
            .bind(input.elevation)
            .fetch_one(pool)
            .await
    }

    /// Find a panorama by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Panorama>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM panoramas WHERE id = $1");
        sqlx::query_as::<_, Panorama>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}

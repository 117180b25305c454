//! Repository for the `dents` table.

use sqlx::PgPool;
use tempest_core::types::DbId;

use crate::models::dent::{Dent, NewDent};
use crate::models::status::ServiceStatus;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, hailpad_id, angle, centroid_x, centroid_y, major_axis, minor_axis, \
    max_depth, created_at, updated_at";

/// Provides operations for dents.
pub struct DentRepo;

impl DentRepo {
    /// Replace a hailpad's dent set with the latest analysis result and
    /// mark the analysis sub-status Complete, all in one transaction.
    ///
    /// A redelivered analysis job therefore converges on the same final
    /// state instead of accumulating duplicate rows.
    pub async fn replace_for_hailpad(
        pool: &PgPool,
        hailpad_id: DbId,
        dents: &[NewDent],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM dents WHERE hailpad_id = $1")
            .bind(hailpad_id)
            .execute(&mut *tx)
            .await?;

        for dent in dents {
            sqlx::query(
                "INSERT INTO dents \
                    (hailpad_id, angle, centroid_x, centroid_y, \
                     major_axis, minor_axis, max_depth) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(hailpad_id)
            .bind(dent.angle)
            .bind(dent.centroid_x)
            .bind(dent.centroid_y)
            .bind(dent.major_axis)
            .bind(dent.minor_axis)
            .bind(dent.max_depth)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE hailpads SET analysis_status_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(hailpad_id)
        .bind(ServiceStatus::Complete.id())
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    /// List a hailpad's dents.
    pub async fn list_by_hailpad(
        pool: &PgPool,
        hailpad_id: DbId,
    ) -> Result<Vec<Dent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM dents WHERE hailpad_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, Dent>(&query)
            .bind(hailpad_id)
            .fetch_all(pool)
            .await
    }
}

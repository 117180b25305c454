//! Repository for the `hailpads` table.

use sqlx::PgPool;
use tempest_core::types::DbId;

use crate::models::hailpad::{CreateHailpad, Hailpad};
use crate::models::status::{ProcessStatus, ServiceStatus, StatusId};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, name, folder, file_name, depth_map_status_id, analysis_status_id, \
    status_id, boxfit, max_depth, created_at, updated_at";

/// Terminal overall statuses a promotion must never overwrite.
const TERMINAL_STATUSES: [StatusId; 2] = [
    ProcessStatus::Complete as StatusId,
    ProcessStatus::Failed as StatusId,
];

/// Provides CRUD operations for hailpads.
pub struct HailpadRepo;

impl HailpadRepo {
    /// Insert a new hailpad with both service stages pending, returning
    /// the created row.
    pub async fn create(pool: &PgPool, input: &CreateHailpad) -> Result<Hailpad, sqlx::Error> {
        let query = format!(
            "INSERT INTO hailpads \
                (name, folder, file_name, depth_map_status_id, analysis_status_id, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Hailpad>(&query)
            .bind(&input.name)
            .bind(&input.folder)
            .bind(&input.file_name)
            .bind(ServiceStatus::Pending.id())
            .bind(ServiceStatus::Pending.id())
            .bind(ProcessStatus::Pending.id())
            .fetch_one(pool)
            .await
    }

    /// Find a hailpad by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Hailpad>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM hailpads WHERE id = $1");
        sqlx::query_as::<_, Hailpad>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Set the depth-map service sub-status.
    pub async fn set_depth_map_status(
        pool: &PgPool,
        id: DbId,
        status: StatusId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE hailpads SET depth_map_status_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Set the dent-analysis service sub-status.
    pub async fn set_analysis_status(
        pool: &PgPool,
        id: DbId,
        status: StatusId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE hailpads SET analysis_status_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record the analysis box-fitting scale.
    pub async fn set_boxfit(pool: &PgPool, id: DbId, boxfit: f64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE hailpads SET boxfit = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(boxfit)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Record the human-entered calibration depth.
    pub async fn set_max_depth(pool: &PgPool, id: DbId, max_depth: f64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE hailpads SET max_depth = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(max_depth)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Promote the overall status to Complete, only if not already
    /// terminal. Returns whether the row changed.
    pub async fn complete_if_active(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE hailpads \
             SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($3, $4)",
        )
        .bind(id)
        .bind(ProcessStatus::Complete.id())
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark the overall status Failed, only if not already terminal.
    /// Returns whether the row changed.
    pub async fn fail_if_active(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE hailpads \
             SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($3, $4)",
        )
        .bind(id)
        .bind(ProcessStatus::Failed.id())
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Reset a hailpad for reprocessing: delete its dents and return
    /// every status to Pending in one transaction.
    ///
    /// Human-entered calibration (`boxfit`, `max_depth`) survives the
    /// reset so the specimen does not need to be re-measured.
    pub async fn reset(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM dents WHERE hailpad_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE hailpads \
             SET depth_map_status_id = $2, analysis_status_id = $2, \
                 status_id = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(ServiceStatus::Pending.id())
        .bind(ProcessStatus::Pending.id())
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }
}

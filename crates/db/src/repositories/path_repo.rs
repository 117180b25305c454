//! Repository for the `paths` table.

use sqlx::PgPool;
use tempest_core::types::DbId;

use crate::models::path::{CreatePath, Path};
use crate::models::status::{ProcessStatus, StatusId};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, folder, status_id, size_bytes, created_at, updated_at";

/// Terminal overall statuses a promotion must never overwrite.
const TERMINAL_STATUSES: [StatusId; 2] = [
    ProcessStatus::Complete as StatusId,
    ProcessStatus::Failed as StatusId,
];

/// Provides CRUD operations for paths.
pub struct PathRepo;

impl PathRepo {
    /// Insert a new pending path, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreatePath) -> Result<Path, sqlx::Error> {
        let query = format!(
            "INSERT INTO paths (name, folder, status_id, size_bytes) \
             VALUES ($1, $2, $3, 0) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Path>(&query)
            .bind(&input.name)
            .bind(&input.folder)
            .bind(ProcessStatus::Pending.id())
            .fetch_one(pool)
            .await
    }

    /// Find a path by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Path>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM paths WHERE id = $1");
        sqlx::query_as::<_, Path>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Set a path's overall status unconditionally (reset flows).
    pub async fn set_status(
        pool: &PgPool,
        id: DbId,
        status: StatusId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE paths SET status_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Promote a path to Complete with its size roll-up, only if it is
    /// not already terminal. Returns whether the row changed.
    ///
    /// The status guard makes concurrent aggregator invocations safe: the
    /// roll-up is applied at most once.
    pub async fn complete_if_active(
        pool: &PgPool,
        id: DbId,
        size_bytes: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE paths \
             SET status_id = $2, size_bytes = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($4, $5)",
        )
        .bind(id)
        .bind(ProcessStatus::Complete.id())
        .bind(size_bytes)
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a path Failed, only if it is not already terminal. Returns
    /// whether the row changed.
    pub async fn fail_if_active(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE paths \
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

    /// Reset a path for re-upload: delete all segments and their captures
    /// and return the path to Pending with a zero roll-up, in one
    /// transaction.
    ///
    /// Returns the orphaned capture file names so the caller can remove
    /// the artifacts after the commit.
    pub async fn reset(pool: &PgPool, id: DbId) -> Result<Vec<String>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let capture_ids: Vec<DbId> = sqlx::query_scalar(
            "SELECT capture_id FROM path_segments WHERE path_id = $1 \
             UNION \
             SELECT street_view_capture_id FROM path_segments \
             WHERE path_id = $1 AND street_view_capture_id IS NOT NULL",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let file_names: Vec<String> =
            sqlx::query_scalar("SELECT file_name FROM captures WHERE id = ANY($1)")
                .bind(&capture_ids)
                .fetch_all(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM path_segments WHERE path_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM captures WHERE id = ANY($1)")
            .bind(&capture_ids)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE paths \
             SET status_id = $2, size_bytes = 0, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(ProcessStatus::Pending.id())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(file_names)
    }
}

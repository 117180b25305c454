//! Repository for the `scans` table.

use sqlx::PgPool;
use tempest_core::types::DbId;

use crate::models::scan::{CreateScan, Scan};
use crate::models::status::{ProcessStatus, StatusId};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, file_name, size_bytes, status_id, created_at, updated_at";

/// Provides CRUD operations for scans.
pub struct ScanRepo;

impl ScanRepo {
    /// Insert a new pending scan, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateScan) -> Result<Scan, sqlx::Error> {
        let query = format!(
            "INSERT INTO scans (name, file_name, size_bytes, status_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Scan>(&query)
            .bind(&input.name)
            .bind(&input.file_name)
            .bind(input.size_bytes)
            .bind(ProcessStatus::Pending.id())
            .fetch_one(pool)
            .await
    }

    /// Find a scan by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Scan>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scans WHERE id = $1");
        sqlx::query_as::<_, Scan>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Set a scan's conversion status.
    pub async fn set_status(pool: &PgPool, id: DbId, status: StatusId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE scans SET status_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(pool)
            .await?;
        Ok(())
    }
}

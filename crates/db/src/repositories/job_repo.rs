//! Repository for the `jobs` table: the durable per-queue FIFO.
//!
//! Uses `JobStatus` from `models::status` for all status transitions.
//! No magic numbers — every status literal is a named constant.

use sqlx::PgPool;
use tempest_core::types::DbId;

use crate::models::job::{Job, QueueCounts};
use crate::models::status::JobStatus;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, queue, payload, status_id, attempts, last_error, \
    submitted_at, claimed_at, completed_at, created_at, updated_at";

/// Provides queue operations for jobs.
pub struct JobRepo;

impl JobRepo {
    /// Durably append a new pending job to a queue.
    ///
    /// Returns once the row is committed; processing happens later when a
    /// worker claims it.
    pub async fn enqueue(
        pool: &PgPool,
        queue: &str,
        payload: &serde_json::Value,
    ) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (queue, payload, status_id) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(queue)
            .bind(payload)
            .bind(JobStatus::Pending.id())
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the oldest pending job on a queue.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers never
    /// double-claim. FIFO within the queue by submission time; queues are
    /// independent of each other. Bumps `attempts` on every claim so
    /// redeliveries are visible.
    pub async fn claim_next(pool: &PgPool, queue: &str) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $2, claimed_at = NOW(), attempts = attempts + 1, \
                 updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE queue = $1 AND status_id = $3 \
                 ORDER BY submitted_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(queue)
            .bind(JobStatus::Running.id())
            .bind(JobStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Acknowledge a job as completed.
    pub async fn complete(pool: &PgPool, job_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(JobStatus::Completed.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Acknowledge a job as failed with an error message.
    ///
    /// No automatic retry is performed. The job stays in `Failed` status;
    /// re-running the pipeline means enqueueing a fresh job.
    pub async fn fail(pool: &PgPool, job_id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, last_error = $3, completed_at = NOW(), \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(JobStatus::Failed.id())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Release jobs claimed longer ago than `older_than_secs` back to
    /// Pending, clearing the claim. Returns how many were released.
    ///
    /// This is the at-least-once redelivery path: a worker that dies
    /// mid-job never acknowledges, and the reaper makes the job claimable
    /// again once the visibility window lapses.
    pub async fn release_stale(pool: &PgPool, older_than_secs: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $1, claimed_at = NULL, updated_at = NOW() \
             WHERE status_id = $2 \
               AND claimed_at < NOW() - make_interval(secs => $3)",
        )
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Running.id())
        .bind(older_than_secs as f64)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Per-status depth counts for one queue.
    pub async fn counts(pool: &PgPool, queue: &str) -> Result<QueueCounts, sqlx::Error> {
        sqlx::query_as::<_, QueueCounts>(
            "SELECT \
                COUNT(*) FILTER (WHERE status_id = $2) AS pending, \
                COUNT(*) FILTER (WHERE status_id = $3) AS running, \
                COUNT(*) FILTER (WHERE status_id = $4) AS completed, \
                COUNT(*) FILTER (WHERE status_id = $5) AS failed \
             FROM jobs WHERE queue = $1",
        )
        .bind(queue)
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Running.id())
        .bind(JobStatus::Completed.id())
        .bind(JobStatus::Failed.id())
        .fetch_one(pool)
        .await
    }
}

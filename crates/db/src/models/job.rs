//! Job entity models for the durable task queue.

use serde::Serialize;
use sqlx::FromRow;
use tempest_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `jobs` table: one queued task.
///
/// Delivery is at-least-once: a claimed job whose worker dies is
/// released back to Pending by the reaper, so `attempts` can exceed 1.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub queue: String,
    pub payload: serde_json::Value,
    pub status_id: StatusId,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub submitted_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Per-status job counts for one queue.
#[derive(Debug, Clone, Copy, Default, FromRow, Serialize)]
pub struct QueueCounts {
    pub pending: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
}

//! Path entity models for the `paths` table.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tempest_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `paths` table: one full traversal of captures.
///
/// `size_bytes` is the roll-up of all owned capture sizes and is written
/// exactly once, when the path is promoted to Complete.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Path {
    pub id: DbId,
    pub name: String,
    /// Content-addressed directory name under `paths/`.
    pub folder: String,
    pub status_id: StatusId,
    pub size_bytes: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a new path row.
#[derive(Debug, Deserialize)]
pub struct CreatePath {
    pub name: String,
    pub folder: String,
}

//! Durable queue job entity model.

use serde::Serialize;
use sqlx::FromRow;
use songforge_core::types::{DbId, Timestamp};

use crate::models::status::StatusId;

/// A row from the `queue_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueueJob {
    pub id: DbId,
    /// Handler name, e.g. "generate" or "download".
    pub name: String,
    pub payload: serde_json::Value,
    pub status_id: StatusId,
    /// Delivery attempts so far; incremented when a worker claims the job.
    pub attempts: i32,
    pub max_attempts: i32,
    /// Base for the exponential retry backoff.
    pub backoff_base_ms: i64,
    /// Earliest time the job may be claimed.
    pub run_at: Timestamp,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

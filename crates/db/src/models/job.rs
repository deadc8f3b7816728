//! Generation job entity model.
//!
//! One row per generation attempt. Clients poll this row for progress;
//! only the generation handler mutates it.

use serde::Serialize;
use sqlx::FromRow;
use songforge_core::types::{DbId, Timestamp};

use crate::models::status::StatusId;

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub track_id: DbId,
    pub job_type: String,
    pub status_id: StatusId,
    /// 0-100, monotonically non-decreasing while the job is running.
    pub progress: i16,
    pub current_step: Option<String>,
    pub error_code: Option<String>,
    pub error_msg: Option<String>,
    pub result: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

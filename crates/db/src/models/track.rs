//! Track entity model and DTOs.
//!
//! A track is a user's music-creation project: the unit the UI shows, jobs
//! generate into, and public share links point at.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use songforge_core::types::{DbId, Timestamp};

use crate::models::status::StatusId;

/// A row from the `tracks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Track {
    pub id: DbId,
    /// Owning device reference (the client's stable device identifier).
    pub device_id: String,
    pub title: Option<String>,
    pub style: Option<String>,
    pub status_id: StatusId,
    /// The user's chosen canonical variant, if one has been picked.
    pub primary_variant_id: Option<DbId>,
    /// Monotonic batch counter; incremented atomically per generation run.
    pub last_batch_index: i32,
    pub deleted_at: Option<Timestamp>,
    pub scheduled_delete_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new track.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTrack {
    pub device_id: String,
    pub title: Option<String>,
    pub style: Option<String>,
}

//! Input asset entity model.
//!
//! Uploaded source audio. The upload flow itself is owned by the API
//! layer; the pipeline only reads the storage key (to build the provider
//! source URL) and collects keys during cleanup.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use songforge_core::types::{DbId, Timestamp};

/// A row from the `assets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Asset {
    pub id: DbId,
    pub track_id: DbId,
    pub storage_key: String,
    pub content_type: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for registering an uploaded asset.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAsset {
    pub track_id: DbId,
    pub storage_key: String,
    pub content_type: Option<String>,
}

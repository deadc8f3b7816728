//! Track variant entity model and DTOs.
//!
//! One row per generated rendition. A generation run produces a batch of
//! two (A and B); re-generations append new batches under a higher
//! `batch_index`, so earlier renditions stay available as history.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use songforge_core::types::{DbId, Timestamp};

use crate::models::status::StatusId;

/// A row from the `track_variants` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TrackVariant {
    pub id: DbId,
    pub track_id: DbId,
    /// Variant label within the batch: "A" or "B".
    pub variant: String,
    pub batch_index: i32,
    /// Remote media URLs as returned by the provider.
    pub audio_url: String,
    pub image_url: Option<String>,
    pub image_large_url: Option<String>,
    pub duration_secs: Option<f64>,
    /// Name of the provider that produced this variant.
    pub provider: String,
    /// Locally-archived object storage keys, populated by the download job.
    pub local_audio_key: Option<String>,
    pub local_image_key: Option<String>,
    pub local_image_large_key: Option<String>,
    /// Audio archive status; tracked independently from the images.
    pub download_status_id: StatusId,
    pub image_download_status_id: StatusId,
    pub download_error: Option<String>,
    pub downloaded_at: Option<Timestamp>,
    pub similarity_score: Option<f64>,
    pub quality_score: Option<f64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a variant when a generation batch completes.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTrackVariant {
    pub track_id: DbId,
    pub variant: String,
    pub batch_index: i32,
    pub audio_url: String,
    pub image_url: Option<String>,
    pub image_large_url: Option<String>,
    pub duration_secs: Option<f64>,
    pub provider: String,
    pub similarity_score: Option<f64>,
    pub quality_score: Option<f64>,
}

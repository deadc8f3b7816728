//! Download job handler.
//!
//! Archives one variant's vendor-hosted media (audio plus two cover image
//! sizes) into durable object storage. The audio leg is the job: its
//! failure fails the whole run and the queue retries. Each image leg is
//! independent, so a missing or broken cover never blocks the audio or
//! the other image, and partial success is a valid terminal state.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use songforge_core::types::DbId;
use songforge_db::models::status::DownloadStatus;
use songforge_db::repositories::TrackVariantRepo;
use sqlx::PgPool;

use crate::error::PipelineError;
use crate::storage::ObjectStorage;

/// Bound on the audio transfer.
const AUDIO_TIMEOUT: Duration = Duration::from_secs(120);
/// Maximum audio size: 50 MB.
const AUDIO_MAX_BYTES: usize = 50 * 1024 * 1024;
/// Bound on each image transfer.
const IMAGE_TIMEOUT: Duration = Duration::from_secs(60);
/// Maximum image size: 10 MB.
const IMAGE_MAX_BYTES: usize = 10 * 1024 * 1024;

/// Payload of a `download` queue job, one per variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadJobPayload {
    pub variant_id: DbId,
    pub track_id: DbId,
    pub variant: String,
    pub batch_index: i32,
    /// Vendor-hosted audio URL.
    pub source_url: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_large_url: Option<String>,
}

/// Object storage keys for one variant's archived media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantKeys {
    pub audio: String,
    pub image: String,
    pub image_large: String,
}

/// Derive the storage keys for a variant's media.
///
/// Keys are a pure function of track, batch, and variant, with no
/// wall-clock component, so a retried attempt overwrites its
/// predecessor's partial objects instead of orphaning them.
pub fn variant_object_keys(track_id: DbId, batch_index: i32, variant: &str) -> VariantKeys {
    let stem = format!("tracks/{track_id}/b{batch_index}/{}", variant.to_lowercase());
    VariantKeys {
        audio: format!("{stem}.mp3"),
        image: format!("{stem}.jpg"),
        image_large: format!("{stem}_large.jpg"),
    }
}

/// Resolve the image-leg status from the surviving keys: `Completed` iff
/// at least one image leg succeeded.
fn image_leg_status(image_key: &Option<String>, image_large_key: &Option<String>) -> DownloadStatus {
    if image_key.is_some() || image_large_key.is_some() {
        DownloadStatus::Completed
    } else {
        DownloadStatus::Failed
    }
}

/// Archives variant media into object storage.
pub struct DownloadHandler {
    pool: PgPool,
    storage: Arc<dyn ObjectStorage>,
}

impl DownloadHandler {
    pub fn new(pool: PgPool, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { pool, storage }
    }

    /// Run one download job to a terminal state.
    ///
    /// An audio-leg failure records failed statuses plus the error on the
    /// variant row, then re-raises so the queue's retry policy engages.
    pub async fn run(&self, payload: &DownloadJobPayload) -> Result<(), PipelineError> {
        tracing::info!(
            variant_id = payload.variant_id,
            track_id = payload.track_id,
            variant = %payload.variant,
            batch_index = payload.batch_index,
            "Download job started",
        );

        TrackVariantRepo::mark_downloading(&self.pool, payload.variant_id).await?;
        let keys = variant_object_keys(payload.track_id, payload.batch_index, &payload.variant);

        // Audio leg: fatal on failure.
        let audio = match self
            .storage
            .upload_from_url(
                &payload.source_url,
                &keys.audio,
                "audio/mpeg",
                AUDIO_TIMEOUT,
                AUDIO_MAX_BYTES,
            )
            .await
        {
            Ok(info) => info,
            Err(e) => {
                tracing::error!(
                    variant_id = payload.variant_id,
                    source_url = %payload.source_url,
                    error = %e,
                    "Audio download failed",
                );
                if let Err(db_err) =
                    TrackVariantRepo::fail_download(&self.pool, payload.variant_id, &e.to_string())
                        .await
                {
                    tracing::error!(error = %db_err, "Failed to record download failure");
                }
                return Err(e.into());
            }
        };

        // Image legs: independent, never fatal.
        let image_key = self
            .fetch_image(payload, payload.image_url.as_deref(), &keys.image)
            .await;
        let image_large_key = self
            .fetch_image(payload, payload.image_large_url.as_deref(), &keys.image_large)
            .await;
        let image_status = image_leg_status(&image_key, &image_large_key);

        TrackVariantRepo::complete_download(
            &self.pool,
            payload.variant_id,
            &audio.key,
            image_key.as_deref(),
            image_large_key.as_deref(),
            image_status.id(),
        )
        .await?;

        tracing::info!(
            variant_id = payload.variant_id,
            audio_key = %audio.key,
            audio_size = audio.size,
            image_status = ?image_status,
            "Download job finished",
        );
        Ok(())
    }

    /// Archive one cover image, swallowing failures.
    async fn fetch_image(
        &self,
        payload: &DownloadJobPayload,
        url: Option<&str>,
        key: &str,
    ) -> Option<String> {
        let url = url?;
        match self
            .storage
            .upload_from_url(url, key, "image/jpeg", IMAGE_TIMEOUT, IMAGE_MAX_BYTES)
            .await
        {
            Ok(info) => Some(info.key),
            Err(e) => {
                tracing::warn!(
                    variant_id = payload.variant_id,
                    url,
                    error = %e,
                    "Cover image download failed",
                );
                None
            }
        }
    }
}

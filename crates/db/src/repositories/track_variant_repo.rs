//! Repository for the `track_variants` table.

use sqlx::PgPool;
use songforge_core::types::DbId;

use crate::models::status::{DownloadStatus, StatusId};
use crate::models::track_variant::{CreateTrackVariant, TrackVariant};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, track_id, variant, batch_index, audio_url, image_url, image_large_url, \
    duration_secs, provider, local_audio_key, local_image_key, local_image_large_key, \
    download_status_id, image_download_status_id, download_error, downloaded_at, \
    similarity_score, quality_score, created_at, updated_at";

/// Provides CRUD and download-state operations for track variants.
pub struct TrackVariantRepo;

impl TrackVariantRepo {
    /// Insert a new variant, returning the created row.
    ///
    /// Download statuses start at `Pending`.
    pub async fn create(
        pool: &PgPool,
        input: &CreateTrackVariant,
    ) -> Result<TrackVariant, sqlx::Error> {
        let query = format!(
            "INSERT INTO track_variants \
                 (track_id, variant, batch_index, audio_url, image_url, image_large_url, \
                  duration_secs, provider, download_status_id, image_download_status_id, \
                  similarity_score, quality_score) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9, $10, $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TrackVariant>(&query)
            .bind(input.track_id)
            .bind(&input.variant)
            .bind(input.batch_index)
            .bind(&input.audio_url)
            .bind(&input.image_url)
            .bind(&input.image_large_url)
            .bind(input.duration_secs)
            .bind(&input.provider)
            .bind(DownloadStatus::Pending.id())
            .bind(input.similarity_score)
            .bind(input.quality_score)
            .fetch_one(pool)
            .await
    }

    /// Find a variant by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<TrackVariant>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM track_variants WHERE id = $1");
        sqlx::query_as::<_, TrackVariant>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all variants for a track, newest batch first, A before B.
    pub async fn list_by_track(
        pool: &PgPool,
        track_id: DbId,
    ) -> Result<Vec<TrackVariant>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM track_variants \
             WHERE track_id = $1 \
             ORDER BY batch_index DESC, variant ASC"
        );
        sqlx::query_as::<_, TrackVariant>(&query)
            .bind(track_id)
            .fetch_all(pool)
            .await
    }

    /// Mark both download legs as in flight.
    pub async fn mark_downloading(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE track_variants \
             SET download_status_id = $2, image_download_status_id = $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(DownloadStatus::Downloading.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Persist a finished download.
    ///
    /// The audio key is always present (an audio failure never reaches
    /// here); image keys are whatever survived their independent legs.
    /// Clears any error from a previous attempt.
    pub async fn complete_download(
        pool: &PgPool,
        id: DbId,
        audio_key: &str,
        image_key: Option<&str>,
        image_large_key: Option<&str>,
        image_status: StatusId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE track_variants \
             SET local_audio_key = $2, local_image_key = $3, local_image_large_key = $4, \
                 download_status_id = $5, image_download_status_id = $6, \
                 download_error = NULL, downloaded_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(audio_key)
        .bind(image_key)
        .bind(image_large_key)
        .bind(DownloadStatus::Completed.id())
        .bind(image_status)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record an audio-leg failure.
    pub async fn fail_download(pool: &PgPool, id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE track_variants \
             SET download_status_id = $2, image_download_status_id = $2, \
                 download_error = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(DownloadStatus::Failed.id())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Collect every non-null local storage key across a track's variants.
    pub async fn storage_keys_for_track(
        pool: &PgPool,
        track_id: DbId,
    ) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(Option<String>, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT local_audio_key, local_image_key, local_image_large_key \
             FROM track_variants WHERE track_id = $1",
        )
        .bind(track_id)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .flat_map(|(audio, image, image_large)| [audio, image, image_large])
            .flatten()
            .collect())
    }
}

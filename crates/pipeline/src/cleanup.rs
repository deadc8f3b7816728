//! Cleanup job handler.
//!
//! Periodic sweep that hard-deletes soft-deleted tracks once their
//! retention window has elapsed: storage objects first (idempotently),
//! then the track row, which cascades to variants, jobs, and assets.
//! One bad track never blocks the rest of the sweep.

use std::sync::Arc;

use chrono::Utc;
use songforge_db::models::track::Track;
use songforge_db::repositories::{AssetRepo, TrackRepo, TrackVariantRepo};
use sqlx::PgPool;

use crate::error::PipelineError;
use crate::storage::ObjectStorage;

/// Sweeps expired soft-deleted tracks.
pub struct CleanupHandler {
    pool: PgPool,
    storage: Arc<dyn ObjectStorage>,
}

impl CleanupHandler {
    pub fn new(pool: PgPool, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { pool, storage }
    }

    /// Run one sweep. Returns the number of tracks fully purged.
    pub async fn run(&self) -> Result<u32, PipelineError> {
        let expired = TrackRepo::find_expired(&self.pool, Utc::now()).await?;
        if expired.is_empty() {
            tracing::debug!("Cleanup sweep found nothing to purge");
            return Ok(0);
        }

        let mut processed = 0u32;
        for track in &expired {
            match self.purge_track(track).await {
                Ok(()) => processed += 1,
                Err(e) => {
                    // Isolate per-track failures; the next sweep retries.
                    tracing::error!(
                        track_id = track.id,
                        error = %e,
                        "Failed to purge expired track",
                    );
                }
            }
        }

        tracing::info!(
            processed,
            eligible = expired.len(),
            "Cleanup sweep finished",
        );
        Ok(processed)
    }

    /// Delete one track's storage objects, then its row.
    ///
    /// Missing objects delete as success; other storage errors are logged
    /// but do not keep the row alive. The keys are gone from the database
    /// either way, and the sweep must not wedge on a broken object.
    async fn purge_track(&self, track: &Track) -> Result<(), PipelineError> {
        let mut keys = TrackVariantRepo::storage_keys_for_track(&self.pool, track.id).await?;
        keys.extend(AssetRepo::storage_keys_for_track(&self.pool, track.id).await?);

        let outcome = self.storage.delete_objects(&keys).await;
        for (key, error) in &outcome.errors {
            tracing::warn!(
                track_id = track.id,
                key = %key,
                error = %error,
                "Storage delete failed during cleanup",
            );
        }

        TrackRepo::hard_delete(&self.pool, track.id).await?;
        tracing::info!(
            track_id = track.id,
            objects_deleted = outcome.deleted.len(),
            objects_failed = outcome.errors.len(),
            "Expired track purged",
        );
        Ok(())
    }
}

//! Repository for the `assets` table.

use sqlx::PgPool;
use songforge_core::types::DbId;

use crate::models::asset::{Asset, CreateAsset};

/// Column list for `assets` queries.
const COLUMNS: &str = "id, track_id, storage_key, content_type, created_at";

/// Provides operations for input assets.
pub struct AssetRepo;

impl AssetRepo {
    /// Register an uploaded asset, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateAsset) -> Result<Asset, sqlx::Error> {
        let query = format!(
            "INSERT INTO assets (track_id, storage_key, content_type) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Asset>(&query)
            .bind(input.track_id)
            .bind(&input.storage_key)
            .bind(&input.content_type)
            .fetch_one(pool)
            .await
    }

    /// Find the newest asset uploaded for a track.
    pub async fn find_latest_for_track(
        pool: &PgPool,
        track_id: DbId,
    ) -> Result<Option<Asset>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM assets \
             WHERE track_id = $1 \
             ORDER BY created_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Asset>(&query)
            .bind(track_id)
            .fetch_optional(pool)
            .await
    }

    /// Collect the storage keys of every asset belonging to a track.
    pub async fn storage_keys_for_track(
        pool: &PgPool,
        track_id: DbId,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT storage_key FROM assets WHERE track_id = $1")
            .bind(track_id)
            .fetch_all(pool)
            .await
    }
}

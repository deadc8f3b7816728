//! Repository for the `tracks` table.

use sqlx::PgPool;
use songforge_core::types::{DbId, Timestamp};

use crate::models::status::TrackStatus;
use crate::models::track::{CreateTrack, Track};

/// Column list for `tracks` queries.
const COLUMNS: &str = "\
    id, device_id, title, style, status_id, primary_variant_id, \
    last_batch_index, deleted_at, scheduled_delete_at, created_at, updated_at";

/// Provides CRUD and lifecycle operations for tracks.
pub struct TrackRepo;

impl TrackRepo {
    /// Insert a new draft track, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateTrack) -> Result<Track, sqlx::Error> {
        let query = format!(
            "INSERT INTO tracks (device_id, title, style, status_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Track>(&query)
            .bind(&input.device_id)
            .bind(&input.title)
            .bind(&input.style)
            .bind(TrackStatus::Draft.id())
            .fetch_one(pool)
            .await
    }

    /// Find a track by its ID. Includes soft-deleted rows (callers that care
    /// check `deleted_at`).
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Track>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tracks WHERE id = $1");
        sqlx::query_as::<_, Track>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Move a track into `Generating`.
    ///
    /// Allowed from any state except an in-flight generation; the guard is
    /// the row-level complement of the request-time "already generating"
    /// check. Returns `false` when the track was already generating.
    pub async fn set_generating(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tracks SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id != $2",
        )
        .bind(id)
        .bind(TrackStatus::Generating.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a track `Ready` with the style that was used for generation.
    pub async fn set_ready(pool: &PgPool, id: DbId, style: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tracks SET status_id = $2, style = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(TrackStatus::Ready.id())
        .bind(style)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a track `Failed`.
    pub async fn set_failed(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tracks SET status_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(TrackStatus::Failed.id())
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Set the user's chosen primary variant.
    ///
    /// The variant must belong to the track; the guard is in the statement
    /// so a stale or foreign variant id can never be linked. Returns `false`
    /// when nothing was updated.
    pub async fn set_primary_variant(
        pool: &PgPool,
        id: DbId,
        variant_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tracks SET primary_variant_id = $2, updated_at = NOW() \
             WHERE id = $1 AND EXISTS ( \
                 SELECT 1 FROM track_variants v WHERE v.id = $2 AND v.track_id = $1 \
             )",
        )
        .bind(id)
        .bind(variant_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically allocate the next batch index for a track.
    ///
    /// Uses a counter column rather than `MAX(batch_index)` so indexes are
    /// strictly increasing even when earlier batches have lost all their
    /// variants, and so concurrent allocations cannot collide.
    pub async fn next_batch_index(pool: &PgPool, id: DbId) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE tracks SET last_batch_index = last_batch_index + 1, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING last_batch_index",
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }

    /// Soft-delete a track, scheduling the hard delete.
    pub async fn soft_delete(
        pool: &PgPool,
        id: DbId,
        scheduled_delete_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tracks SET deleted_at = NOW(), scheduled_delete_at = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(scheduled_delete_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// List soft-deleted tracks whose retention window has elapsed.
    pub async fn find_expired(pool: &PgPool, now: Timestamp) -> Result<Vec<Track>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tracks \
             WHERE deleted_at IS NOT NULL AND scheduled_delete_at <= $1 \
             ORDER BY scheduled_delete_at ASC"
        );
        sqlx::query_as::<_, Track>(&query)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// Hard-delete a track row. Variants, jobs, and assets go with it via
    /// `ON DELETE CASCADE`.
    pub async fn hard_delete(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM tracks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

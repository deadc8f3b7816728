//! Repository for the `jobs` table.
//!
//! Uses `JobStatus` from `models::status` for all status transitions.
//! No magic numbers -- every status literal is a named constant.

use sqlx::PgPool;
use songforge_core::types::DbId;

use crate::models::job::Job;
use crate::models::status::{JobStatus, StatusId};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, track_id, job_type, status_id, progress, current_step, \
    error_code, error_msg, result, created_at, started_at, completed_at";

/// Terminal statuses: succeeded, failed.
const TERMINAL_STATUSES: [StatusId; 2] = [
    JobStatus::Succeeded as StatusId,
    JobStatus::Failed as StatusId,
];

/// Provides lifecycle operations for generation jobs.
pub struct JobRepo;

impl JobRepo {
    /// Create a new queued generation job for a track.
    pub async fn create(pool: &PgPool, track_id: DbId) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (track_id, job_type, status_id) \
             VALUES ($1, 'generate', $2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(track_id)
            .bind(JobStatus::Queued.id())
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Move a job into `Running`.
    ///
    /// Idempotent across queue redeliveries: `started_at` is only stamped
    /// on the first transition.
    pub async fn mark_running(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, started_at = COALESCE(started_at, NOW()) \
             WHERE id = $1 AND status_id NOT IN ($3, $4)",
        )
        .bind(id)
        .bind(JobStatus::Running.id())
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Update progress and the current step label.
    ///
    /// Progress is monotonic while running: `GREATEST` keeps a late or
    /// replayed update from moving the bar backwards, and the status guard
    /// freezes progress once the job is terminal.
    pub async fn update_progress(
        pool: &PgPool,
        id: DbId,
        percent: i16,
        step: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET progress = GREATEST(progress, $2), current_step = $3 \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(percent)
        .bind(step)
        .bind(JobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a job as succeeded with its result payload and progress 100.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        result: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, result = $3, progress = 100, completed_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($4, $5)",
        )
        .bind(id)
        .bind(JobStatus::Succeeded.id())
        .bind(result)
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a job as failed with an error code and message.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        error_code: &str,
        error_msg: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, error_code = $3, error_msg = $4, completed_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($5, $6)",
        )
        .bind(id)
        .bind(JobStatus::Failed.id())
        .bind(error_code)
        .bind(error_msg)
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .execute(pool)
        .await?;
        Ok(())
    }
}

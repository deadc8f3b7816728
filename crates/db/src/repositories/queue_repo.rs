//! Repository for the `queue_jobs` table.
//!
//! The durable work queue: jobs are claimed with `FOR UPDATE SKIP LOCKED`
//! so multiple worker slots (or worker processes) never double-claim, and
//! failed jobs are rescheduled with backoff until their attempt budget is
//! spent.

use sqlx::PgPool;
use songforge_core::types::{DbId, Timestamp};

use crate::models::queue_job::QueueJob;
use crate::models::status::QueueStatus;

/// Column list for `queue_jobs` queries.
const COLUMNS: &str = "\
    id, name, payload, status_id, attempts, max_attempts, backoff_base_ms, \
    run_at, last_error, created_at, updated_at";

/// Provides enqueue/claim/settle operations for the durable queue.
pub struct QueueRepo;

impl QueueRepo {
    /// Enqueue a job for immediate delivery.
    pub async fn enqueue(
        pool: &PgPool,
        name: &str,
        payload: &serde_json::Value,
        max_attempts: i32,
        backoff_base_ms: i64,
    ) -> Result<QueueJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO queue_jobs (name, payload, status_id, max_attempts, backoff_base_ms) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueueJob>(&query)
            .bind(name)
            .bind(payload)
            .bind(QueueStatus::Queued.id())
            .bind(max_attempts)
            .bind(backoff_base_ms)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the next due job.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` to prevent double-dispatch
    /// across worker slots. The attempt counter is incremented at claim
    /// time, so `attempts` on the returned row is the current attempt
    /// number (1-based).
    pub async fn claim_next(pool: &PgPool) -> Result<Option<QueueJob>, sqlx::Error> {
        let query = format!(
            "UPDATE queue_jobs \
             SET status_id = $1, attempts = attempts + 1, updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM queue_jobs \
                 WHERE status_id = $2 AND run_at <= NOW() \
                 ORDER BY run_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueueJob>(&query)
            .bind(QueueStatus::Running.id())
            .bind(QueueStatus::Queued.id())
            .fetch_optional(pool)
            .await
    }

    /// Settle a job that ran to completion.
    pub async fn complete(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE queue_jobs SET status_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(QueueStatus::Completed.id())
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Return a failed job to the queue for a later attempt.
    pub async fn reschedule(
        pool: &PgPool,
        id: DbId,
        error: &str,
        run_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE queue_jobs \
             SET status_id = $2, last_error = $3, run_at = $4, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(QueueStatus::Queued.id())
        .bind(error)
        .bind(run_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Park a job whose attempt budget is spent.
    pub async fn mark_dead(pool: &PgPool, id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE queue_jobs \
             SET status_id = $2, last_error = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(QueueStatus::Dead.id())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }
}

//! Job queue abstraction.
//!
//! Handlers enqueue follow-up work (the generation handler fans out one
//! download job per variant) through [`JobQueue`]. The production
//! implementation persists to the `queue_jobs` table; the worker's
//! dispatcher claims from the same table with `FOR UPDATE SKIP LOCKED`.

use async_trait::async_trait;
use songforge_core::types::DbId;
use songforge_db::repositories::QueueRepo;
use sqlx::PgPool;
use tokio::sync::Mutex;

/// Queue job name for generation runs.
pub const GENERATE_JOB: &str = "generate";
/// Queue job name for per-variant media downloads.
pub const DOWNLOAD_JOB: &str = "download";

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

/// Per-job retry policy attached at enqueue time.
#[derive(Debug, Clone, Copy)]
pub struct EnqueueOptions {
    pub max_attempts: i32,
    pub backoff_base_ms: i64,
}

impl EnqueueOptions {
    /// Policy for generation runs: one retry, slow backoff. A generation
    /// failure is usually a vendor condition a quick retry won't fix.
    pub fn generate() -> Self {
        Self {
            max_attempts: 2,
            backoff_base_ms: 5_000,
        }
    }

    /// Policy for media downloads: transient network failures are common,
    /// so the budget is generous.
    pub fn download() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_ms: 1_000,
        }
    }
}

/// Exponential retry delay: `base × 2^(attempt-1)`.
///
/// `attempt` is the 1-based attempt that just failed, so the first retry
/// waits `base`, the second `2 × base`, and so on. The shift saturates
/// rather than overflowing for absurd attempt counts.
pub fn retry_delay(base_ms: i64, attempt: i32) -> chrono::Duration {
    let exponent = attempt.saturating_sub(1).clamp(0, 30) as u32;
    let factor = 1i64 << exponent;
    chrono::Duration::milliseconds(base_ms.saturating_mul(factor))
}

/// Durable work queue as the handlers consume it.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Persist a job for at-least-once delivery. Returns the queue job id.
    async fn enqueue(
        &self,
        name: &str,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<DbId, QueueError>;
}

/// Postgres-backed queue.
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(
        &self,
        name: &str,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<DbId, QueueError> {
        let job = QueueRepo::enqueue(
            &self.pool,
            name,
            &payload,
            options.max_attempts,
            options.backoff_base_ms,
        )
        .await?;
        tracing::debug!(queue_job_id = job.id, name, "Job enqueued");
        Ok(job.id)
    }
}

/// In-memory queue for tests.
///
/// Records every enqueue; [`MemoryQueue::failing`] builds one whose
/// enqueues always fail, for exercising swallow-on-enqueue-failure paths.
#[derive(Default)]
pub struct MemoryQueue {
    jobs: Mutex<Vec<(String, serde_json::Value)>>,
    fail: bool,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Snapshot of `(name, payload)` pairs enqueued so far.
    pub async fn jobs(&self) -> Vec<(String, serde_json::Value)> {
        self.jobs.lock().await.clone()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(
        &self,
        name: &str,
        payload: serde_json::Value,
        _options: EnqueueOptions,
    ) -> Result<DbId, QueueError> {
        if self.fail {
            return Err(QueueError::Unavailable("injected failure".to_string()));
        }
        let mut jobs = self.jobs.lock().await;
        jobs.push((name.to_string(), payload));
        Ok(jobs.len() as DbId)
    }
}

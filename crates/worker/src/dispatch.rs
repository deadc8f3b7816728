//! Queue dispatcher: a small pool of worker loops claiming jobs from the
//! durable queue and running them through the handlers.
//!
//! Each loop claims one job at a time with `FOR UPDATE SKIP LOCKED` (via
//! the queue repo), so concurrency is exactly the number of loops and two
//! slots never run the same job. Handler failures feed the per-job retry
//! policy: reschedule with exponential backoff until the attempt budget is
//! spent, then park the job as dead.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use songforge_db::models::queue_job::QueueJob;
use songforge_db::repositories::QueueRepo;
use songforge_db::DbPool;
use songforge_pipeline::queue::{retry_delay, DOWNLOAD_JOB, GENERATE_JOB};
use songforge_pipeline::{
    DownloadHandler, DownloadJobPayload, GenerateJobPayload, GenerationHandler,
};
use tokio_util::sync::CancellationToken;

/// Sleep between claim attempts when the queue is empty.
const IDLE_POLL: Duration = Duration::from_secs(1);

/// Owns the worker pool for one process.
pub struct Dispatcher {
    pool: DbPool,
    generation: Arc<GenerationHandler>,
    download: Arc<DownloadHandler>,
    concurrency: usize,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        pool: DbPool,
        generation: Arc<GenerationHandler>,
        download: Arc<DownloadHandler>,
        concurrency: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            pool,
            generation,
            download,
            concurrency: concurrency.max(1),
            shutdown,
        }
    }

    /// Spawn the worker loops and wait for all of them to stop.
    pub async fn run(self) {
        tracing::info!(concurrency = self.concurrency, "Dispatcher starting");

        let mut handles = Vec::with_capacity(self.concurrency);
        for slot in 0..self.concurrency {
            let worker = WorkerLoop {
                slot,
                pool: self.pool.clone(),
                generation: self.generation.clone(),
                download: self.download.clone(),
                shutdown: self.shutdown.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }
        for handle in handles {
            let _ = handle.await;
        }

        tracing::info!("Dispatcher stopped");
    }
}

struct WorkerLoop {
    slot: usize,
    pool: DbPool,
    generation: Arc<GenerationHandler>,
    download: Arc<DownloadHandler>,
    shutdown: CancellationToken,
}

impl WorkerLoop {
    async fn run(self) {
        tracing::info!(slot = self.slot, "Worker slot started");

        while !self.shutdown.is_cancelled() {
            match QueueRepo::claim_next(&self.pool).await {
                Ok(Some(job)) => self.execute(job).await,
                Ok(None) => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(IDLE_POLL) => {}
                    }
                }
                Err(e) => {
                    tracing::error!(slot = self.slot, error = %e, "Failed to claim queue job");
                    tokio::time::sleep(IDLE_POLL).await;
                }
            }
        }

        tracing::info!(slot = self.slot, "Worker slot stopped");
    }

    /// Run one claimed job and settle its queue state.
    async fn execute(&self, job: QueueJob) {
        tracing::info!(
            slot = self.slot,
            queue_job_id = job.id,
            name = %job.name,
            attempt = job.attempts,
            "Executing queue job",
        );

        match self.dispatch(&job).await {
            Ok(()) => {
                if let Err(e) = QueueRepo::complete(&self.pool, job.id).await {
                    tracing::error!(queue_job_id = job.id, error = %e, "Failed to settle queue job");
                }
            }
            Err(message) => {
                if job.attempts >= job.max_attempts {
                    tracing::warn!(
                        queue_job_id = job.id,
                        name = %job.name,
                        attempts = job.attempts,
                        error = %message,
                        "Queue job exhausted its attempts, parking as dead",
                    );
                    if let Err(e) = QueueRepo::mark_dead(&self.pool, job.id, &message).await {
                        tracing::error!(queue_job_id = job.id, error = %e, "Failed to park queue job");
                    }
                } else {
                    let run_at = Utc::now() + retry_delay(job.backoff_base_ms, job.attempts);
                    tracing::warn!(
                        queue_job_id = job.id,
                        name = %job.name,
                        attempt = job.attempts,
                        retry_at = %run_at,
                        error = %message,
                        "Queue job failed, rescheduling",
                    );
                    if let Err(e) = QueueRepo::reschedule(&self.pool, job.id, &message, run_at).await
                    {
                        tracing::error!(queue_job_id = job.id, error = %e, "Failed to reschedule queue job");
                    }
                }
            }
        }
    }

    /// Route a claimed job to its handler by name.
    async fn dispatch(&self, job: &QueueJob) -> Result<(), String> {
        match job.name.as_str() {
            GENERATE_JOB => {
                let payload: GenerateJobPayload = serde_json::from_value(job.payload.clone())
                    .map_err(|e| format!("invalid generate payload: {e}"))?;
                self.generation.run(&payload).await.map_err(|e| e.to_string())
            }
            DOWNLOAD_JOB => {
                let payload: DownloadJobPayload = serde_json::from_value(job.payload.clone())
                    .map_err(|e| format!("invalid download payload: {e}"))?;
                self.download.run(&payload).await.map_err(|e| e.to_string())
            }
            other => Err(format!("unknown job name: {other}")),
        }
    }
}

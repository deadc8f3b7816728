//! End-to-end tests for the generation job handler.
//!
//! Runs the real handler against a real database, with the mock provider
//! standing in for the vendor and in-memory queue/collector fakes, to
//! verify the full success path (job succeeded, track ready, variants
//! persisted, downloads fanned out) and every failure path (provider
//! rejection, vendor task failure, poll timeout, lost enqueue).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use songforge_core::config::StorageConfig;
use songforge_core::generation::ERROR_CODE_PROVIDER;
use songforge_db::models::asset::CreateAsset;
use songforge_db::models::job::Job;
use songforge_db::models::status::{DownloadStatus, JobStatus, TrackStatus};
use songforge_db::models::track::{CreateTrack, Track};
use songforge_db::repositories::{AssetRepo, JobRepo, TrackRepo, TrackVariantRepo};
use songforge_pipeline::queue::{JobQueue, MemoryQueue, DOWNLOAD_JOB};
use songforge_pipeline::trace::{MemoryCollector, TraceCollector};
use songforge_pipeline::{DownloadJobPayload, GenerateJobPayload, GenerationHandler};
use songforge_provider::chain::ProviderChain;
use songforge_provider::mock::MockProvider;
use songforge_provider::{
    GenerateRequest, MusicProvider, ProviderError, SubmitResponse, TaskResult, TaskStatus,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn storage_config() -> StorageConfig {
    StorageConfig {
        endpoint: "http://localhost:9000".to_string(),
        region: "us-east-1".to_string(),
        bucket: "songforge-test".to_string(),
        cdn_base_url: None,
    }
}

async fn seed_track_with_asset(pool: &PgPool) -> (Track, Job) {
    let track = TrackRepo::create(
        pool,
        &CreateTrack {
            device_id: "dev-1".to_string(),
            title: Some("Pipeline Test".to_string()),
            style: Some("lofi".to_string()),
        },
    )
    .await
    .unwrap();
    AssetRepo::create(
        pool,
        &CreateAsset {
            track_id: track.id,
            storage_key: format!("uploads/{}/input.mp3", track.id),
            content_type: Some("audio/mpeg".to_string()),
        },
    )
    .await
    .unwrap();
    let job = JobRepo::create(pool, track.id).await.unwrap();
    (track, job)
}

fn payload(job: &Job, track: &Track) -> GenerateJobPayload {
    GenerateJobPayload {
        job_id: job.id,
        track_id: track.id,
        style: None,
        lyrics: None,
        voice_type: None,
        exclude_styles: Vec::new(),
        trim_start_ms: None,
        trim_end_ms: None,
    }
}

/// Handler wired to an instantly-completing mock provider.
fn mock_handler(
    pool: PgPool,
    queue: Arc<dyn JobQueue>,
    collector: Arc<dyn TraceCollector>,
) -> GenerationHandler {
    let mock: Arc<dyn MusicProvider> = Arc::new(MockProvider::with_windows(
        "suno",
        Duration::ZERO,
        Duration::ZERO,
    ));
    handler_for(pool, ProviderChain::single(mock), queue, collector)
}

fn handler_for(
    pool: PgPool,
    chain: ProviderChain,
    queue: Arc<dyn JobQueue>,
    collector: Arc<dyn TraceCollector>,
) -> GenerationHandler {
    GenerationHandler::new(pool, Arc::new(chain), queue, collector, storage_config())
        .with_polling(Duration::from_millis(1), 5)
}

/// Adapter that rejects every submission.
struct RejectingProvider;

#[async_trait]
impl MusicProvider for RejectingProvider {
    fn name(&self) -> &str {
        "suno"
    }

    async fn submit_generate(
        &self,
        _request: &GenerateRequest,
    ) -> Result<SubmitResponse, ProviderError> {
        Err(ProviderError::Vendor {
            code: 503,
            message: "quota exhausted".to_string(),
        })
    }

    async fn query_task(&self, task_id: &str) -> Result<TaskResult, ProviderError> {
        Err(ProviderError::UnknownTask(task_id.to_string()))
    }
}

/// Adapter whose tasks settle into a fixed status.
struct SettlingProvider {
    status: TaskStatus,
    error: Option<String>,
}

#[async_trait]
impl MusicProvider for SettlingProvider {
    fn name(&self) -> &str {
        "suno"
    }

    async fn submit_generate(
        &self,
        _request: &GenerateRequest,
    ) -> Result<SubmitResponse, ProviderError> {
        Ok(SubmitResponse {
            task_id: "task-1".to_string(),
        })
    }

    async fn query_task(&self, _task_id: &str) -> Result<TaskResult, ProviderError> {
        Ok(TaskResult {
            status: self.status,
            variants: Vec::new(),
            error: self.error.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Test: success path
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_successful_run_settles_job_track_and_variants(pool: PgPool) {
    let (track, job) = seed_track_with_asset(&pool).await;
    let queue = Arc::new(MemoryQueue::new());
    let collector = Arc::new(MemoryCollector::new());
    let handler = mock_handler(pool.clone(), queue.clone(), collector.clone());

    handler.run(&payload(&job, &track)).await.unwrap();

    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.status_id, JobStatus::Succeeded.id());
    assert_eq!(job.progress, 100);
    let result = job.result.expect("succeeded jobs carry a result payload");
    assert_eq!(result["variant_count"], 2);
    assert_eq!(result["provider"], "suno");

    let track = TrackRepo::find_by_id(&pool, track.id).await.unwrap().unwrap();
    assert_eq!(track.status_id, TrackStatus::Ready.id());
    assert_eq!(track.style.as_deref(), Some("lofi"));

    let variants = TrackVariantRepo::list_by_track(&pool, track.id).await.unwrap();
    assert_eq!(variants.len(), 2);
    let labels: Vec<&str> = variants.iter().map(|v| v.variant.as_str()).collect();
    assert_eq!(labels, vec!["A", "B"]);
    for variant in &variants {
        assert_eq!(variant.batch_index, 1);
        assert_eq!(variant.provider, "suno");
        assert_eq!(variant.download_status_id, DownloadStatus::Pending.id());
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_successful_run_fans_out_one_download_per_variant(pool: PgPool) {
    let (track, job) = seed_track_with_asset(&pool).await;
    let queue = Arc::new(MemoryQueue::new());
    let collector = Arc::new(MemoryCollector::new());
    let handler = mock_handler(pool.clone(), queue.clone(), collector.clone());

    handler.run(&payload(&job, &track)).await.unwrap();

    let jobs = queue.jobs().await;
    assert_eq!(jobs.len(), 2);
    let variants = TrackVariantRepo::list_by_track(&pool, track.id).await.unwrap();
    for (name, body) in &jobs {
        assert_eq!(name, DOWNLOAD_JOB);
        let download: DownloadJobPayload = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(download.track_id, track.id);
        assert_eq!(download.batch_index, 1);
        assert!(
            variants.iter().any(|v| v.id == download.variant_id
                && v.variant == download.variant
                && v.audio_url == download.source_url),
            "each download payload points at a persisted variant"
        );
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_successful_run_emits_spans_and_scores(pool: PgPool) {
    let (track, job) = seed_track_with_asset(&pool).await;
    let queue = Arc::new(MemoryQueue::new());
    let collector = Arc::new(MemoryCollector::new());
    let handler = mock_handler(pool.clone(), queue.clone(), collector.clone());

    handler.run(&payload(&job, &track)).await.unwrap();

    let traces = collector.traces().await;
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].1["job_id"], job.id);

    let span_names: Vec<String> = collector
        .spans()
        .await
        .into_iter()
        .map(|(_, s)| s.name)
        .collect();
    assert_eq!(
        span_names,
        vec!["audio_check", "compose_params", "music_generate", "ab_eval"],
        "one span per step, in step order"
    );

    let scores = collector.scores().await;
    assert_eq!(scores.len(), 5);
    assert!(scores.iter().all(|(_, s)| (0.0..=1.0).contains(&s.value)));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_regeneration_appends_a_new_batch(pool: PgPool) {
    let (track, first_job) = seed_track_with_asset(&pool).await;
    let queue = Arc::new(MemoryQueue::new());
    let collector = Arc::new(MemoryCollector::new());
    let handler = mock_handler(pool.clone(), queue.clone(), collector.clone());

    handler.run(&payload(&first_job, &track)).await.unwrap();
    let second_job = JobRepo::create(&pool, track.id).await.unwrap();
    handler.run(&payload(&second_job, &track)).await.unwrap();

    let variants = TrackVariantRepo::list_by_track(&pool, track.id).await.unwrap();
    assert_eq!(variants.len(), 4);

    let mut batches: Vec<i32> = variants.iter().map(|v| v.batch_index).collect();
    batches.sort();
    assert_eq!(batches, vec![1, 1, 2, 2], "history is appended, never overwritten");
}

// ---------------------------------------------------------------------------
// Test: failure paths
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_provider_rejection_fails_job_and_track(pool: PgPool) {
    let (track, job) = seed_track_with_asset(&pool).await;
    let queue = Arc::new(MemoryQueue::new());
    let collector = Arc::new(MemoryCollector::new());
    let handler = handler_for(
        pool.clone(),
        ProviderChain::single(Arc::new(RejectingProvider)),
        queue.clone(),
        collector.clone(),
    );

    let err = handler.run(&payload(&job, &track)).await.unwrap_err();
    assert!(err.to_string().contains("quota exhausted"));

    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.status_id, JobStatus::Failed.id());
    assert_eq!(job.error_code.as_deref(), Some(ERROR_CODE_PROVIDER));
    assert!(job.error_msg.is_some());

    let track = TrackRepo::find_by_id(&pool, track.id).await.unwrap().unwrap();
    assert_eq!(track.status_id, TrackStatus::Failed.id());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_failure_records_the_inflight_step(pool: PgPool) {
    let (track, job) = seed_track_with_asset(&pool).await;
    let queue = Arc::new(MemoryQueue::new());
    let collector = Arc::new(MemoryCollector::new());
    let handler = handler_for(
        pool.clone(),
        ProviderChain::single(Arc::new(RejectingProvider)),
        queue.clone(),
        collector.clone(),
    );

    let _ = handler.run(&payload(&job, &track)).await;

    let spans = collector.spans().await;
    let error_span = spans
        .iter()
        .map(|(_, s)| s)
        .find(|s| s.name == "error")
        .expect("failures ship an error span");
    assert_eq!(error_span.input["step"], "music_generate");

    let scores = collector.scores().await;
    assert!(scores.is_empty(), "scores are only emitted on success");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_vendor_task_failure_surfaces_its_message(pool: PgPool) {
    let (track, job) = seed_track_with_asset(&pool).await;
    let queue = Arc::new(MemoryQueue::new());
    let collector = Arc::new(MemoryCollector::new());
    let handler = handler_for(
        pool.clone(),
        ProviderChain::single(Arc::new(SettlingProvider {
            status: TaskStatus::Failed,
            error: Some("input audio too short".to_string()),
        })),
        queue.clone(),
        collector.clone(),
    );

    handler.run(&payload(&job, &track)).await.unwrap_err();

    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.status_id, JobStatus::Failed.id());
    assert!(job.error_msg.unwrap().contains("input audio too short"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_poll_budget_exhaustion_times_out(pool: PgPool) {
    let (track, job) = seed_track_with_asset(&pool).await;
    let queue = Arc::new(MemoryQueue::new());
    let collector = Arc::new(MemoryCollector::new());
    // The task never leaves Processing, so the attempt budget runs out.
    let handler = handler_for(
        pool.clone(),
        ProviderChain::single(Arc::new(SettlingProvider {
            status: TaskStatus::Processing,
            error: None,
        })),
        queue.clone(),
        collector.clone(),
    );

    let err = handler.run(&payload(&job, &track)).await.unwrap_err();
    assert!(err.to_string().contains("Timed out"), "got: {err}");

    // The timeout shares the provider error code on the job row even
    // though the internal cause is distinct.
    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.status_id, JobStatus::Failed.id());
    assert_eq!(job.error_code.as_deref(), Some(ERROR_CODE_PROVIDER));

    let track = TrackRepo::find_by_id(&pool, track.id).await.unwrap().unwrap();
    assert_eq!(track.status_id, TrackStatus::Failed.id());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_missing_input_asset_fails_the_job(pool: PgPool) {
    // Track without any uploaded asset.
    let track = TrackRepo::create(
        &pool,
        &CreateTrack {
            device_id: "dev-1".to_string(),
            title: None,
            style: None,
        },
    )
    .await
    .unwrap();
    let job = JobRepo::create(&pool, track.id).await.unwrap();
    let queue = Arc::new(MemoryQueue::new());
    let collector = Arc::new(MemoryCollector::new());
    let handler = mock_handler(pool.clone(), queue.clone(), collector.clone());

    handler.run(&payload(&job, &track)).await.unwrap_err();

    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.status_id, JobStatus::Failed.id());
    assert!(job.error_msg.unwrap().contains("no input asset"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_lost_download_enqueue_does_not_fail_the_run(pool: PgPool) {
    let (track, job) = seed_track_with_asset(&pool).await;
    let queue = Arc::new(MemoryQueue::failing());
    let collector = Arc::new(MemoryCollector::new());
    let handler = mock_handler(pool.clone(), queue.clone(), collector.clone());

    handler.run(&payload(&job, &track)).await.unwrap();

    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(
        job.status_id,
        JobStatus::Succeeded.id(),
        "the generation itself succeeded; a lost enqueue is not its failure"
    );

    let variants = TrackVariantRepo::list_by_track(&pool, track.id).await.unwrap();
    assert_eq!(variants.len(), 2, "variants persist even when downloads are lost");
}

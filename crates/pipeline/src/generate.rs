//! Generation job handler.
//!
//! Drives one generation run through its fixed step sequence:
//!
//! 1. `audio_check` -- the input asset exists and is usable.
//! 2. `compose_params` -- resolve the provider request from the track and
//!    the job payload.
//! 3. `music_generate` -- submit through the provider chain, then poll the
//!    accepting adapter until the task settles or the budget runs out.
//! 4. `ab_eval` -- persist one variant row per rendition and enqueue the
//!    per-variant download jobs.
//! 5. finalize -- track `Ready`, job `Succeeded`.
//!
//! Each step bumps the job's progress/current-step before doing its work,
//! so polling clients always see a monotonic bar. Any failure is caught
//! once at the top: job and track are marked failed *before* the error is
//! re-raised to the queue, so a crash right after leaves consistent state.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use songforge_core::config::StorageConfig;
use songforge_core::generation::{
    polling_progress, resolve_title, source_audio_url, VoiceType, MAX_POLL_ATTEMPTS,
    POLL_INTERVAL_SECS, PROGRESS_AB_EVAL, PROGRESS_AUDIO_CHECK, PROGRESS_COMPOSE_PARAMS,
    PROGRESS_GENERATE_START, STEP_AB_EVAL, STEP_AUDIO_CHECK, STEP_COMPOSE_PARAMS,
    STEP_MUSIC_GENERATE,
};
use songforge_core::scoring::mock_evaluation_scores;
use songforge_core::types::DbId;
use songforge_db::models::track::Track;
use songforge_db::models::track_variant::CreateTrackVariant;
use songforge_db::repositories::{AssetRepo, JobRepo, TrackRepo, TrackVariantRepo};
use songforge_provider::chain::{ChainSubmit, ProviderChain};
use songforge_provider::{GenerateRequest, TaskResult, TaskStatus};
use sqlx::PgPool;

use crate::download::DownloadJobPayload;
use crate::error::PipelineError;
use crate::queue::{EnqueueOptions, JobQueue, DOWNLOAD_JOB};
use crate::trace::{Score, SpanRecorder, TraceCollector};

/// Style used when neither the payload nor the track carries one.
const DEFAULT_STYLE: &str = "pop";

/// Payload of a `generate` queue job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateJobPayload {
    pub job_id: DbId,
    pub track_id: DbId,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub voice_type: Option<VoiceType>,
    #[serde(default)]
    pub exclude_styles: Vec<String>,
    #[serde(default)]
    pub trim_start_ms: Option<i64>,
    #[serde(default)]
    pub trim_end_ms: Option<i64>,
}

/// What a successful run produced; becomes the job's result payload.
struct GenerationOutcome {
    task_id: String,
    provider: String,
    variant_count: usize,
}

/// Orchestrates generation runs.
pub struct GenerationHandler {
    pool: PgPool,
    chain: Arc<ProviderChain>,
    queue: Arc<dyn JobQueue>,
    collector: Arc<dyn TraceCollector>,
    storage: StorageConfig,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl GenerationHandler {
    pub fn new(
        pool: PgPool,
        chain: Arc<ProviderChain>,
        queue: Arc<dyn JobQueue>,
        collector: Arc<dyn TraceCollector>,
        storage: StorageConfig,
    ) -> Self {
        Self {
            pool,
            chain,
            queue,
            collector,
            storage,
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
            max_poll_attempts: MAX_POLL_ATTEMPTS,
        }
    }

    /// Override the polling cadence (tests use millisecond intervals).
    pub fn with_polling(mut self, poll_interval: Duration, max_poll_attempts: u32) -> Self {
        self.poll_interval = poll_interval;
        self.max_poll_attempts = max_poll_attempts;
        self
    }

    /// Run one generation job to a terminal state.
    ///
    /// On failure the job row carries the external error code and message
    /// and the track is marked failed before the error propagates to the
    /// queue's retry policy.
    pub async fn run(&self, payload: &GenerateJobPayload) -> Result<(), PipelineError> {
        let trace_id = uuid::Uuid::new_v4().to_string();
        let mut spans = SpanRecorder::new();

        tracing::info!(
            job_id = payload.job_id,
            track_id = payload.track_id,
            "Generation job started",
        );

        JobRepo::mark_running(&self.pool, payload.job_id).await?;
        TrackRepo::set_generating(&self.pool, payload.track_id).await?;
        self.collector
            .create_trace(
                &trace_id,
                json!({ "job_id": payload.job_id, "track_id": payload.track_id }),
            )
            .await;

        match self.run_steps(payload, &mut spans).await {
            Ok(outcome) => {
                tracing::info!(
                    job_id = payload.job_id,
                    track_id = payload.track_id,
                    provider = %outcome.provider,
                    task_id = %outcome.task_id,
                    variant_count = outcome.variant_count,
                    "Generation job succeeded",
                );
                for score in mock_evaluation_scores() {
                    self.collector
                        .create_score(
                            &trace_id,
                            Score {
                                name: score.name.to_string(),
                                value: score.value,
                                comment: Some(score.comment.to_string()),
                            },
                        )
                        .await;
                }
                spans.flush_to(&*self.collector, &trace_id).await;
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    job_id = payload.job_id,
                    track_id = payload.track_id,
                    step = spans.last_step(),
                    error = %e,
                    "Generation job failed",
                );
                // Persist the failure before re-raising so a crash right
                // after still leaves the client-visible state consistent.
                if let Err(db_err) =
                    JobRepo::fail(&self.pool, payload.job_id, e.external_code(), &e.to_string())
                        .await
                {
                    tracing::error!(error = %db_err, "Failed to mark job failed");
                }
                if let Err(db_err) = TrackRepo::set_failed(&self.pool, payload.track_id).await {
                    tracing::error!(error = %db_err, "Failed to mark track failed");
                }
                spans.record_error(&e.to_string());
                spans.flush_to(&*self.collector, &trace_id).await;
                Err(e)
            }
        }
    }

    async fn run_steps(
        &self,
        payload: &GenerateJobPayload,
        spans: &mut SpanRecorder,
    ) -> Result<GenerationOutcome, PipelineError> {
        let job_id = payload.job_id;
        let track_id = payload.track_id;

        let track = TrackRepo::find_by_id(&self.pool, track_id)
            .await?
            .ok_or(PipelineError::NotFound {
                entity: "track",
                id: track_id,
            })?;

        // -- audio_check --
        let span = spans.open(STEP_AUDIO_CHECK, json!({ "track_id": track_id }));
        JobRepo::update_progress(&self.pool, job_id, PROGRESS_AUDIO_CHECK, STEP_AUDIO_CHECK)
            .await?;
        // TODO: validate audio duration/decodability once the probe service
        // lands; for now presence of the asset row is the whole check.
        let asset = AssetRepo::find_latest_for_track(&self.pool, track_id)
            .await?
            .ok_or(PipelineError::MissingInput { track_id })?;
        spans.close(span, json!({ "storage_key": &asset.storage_key }));

        // -- compose_params --
        let span = spans.open(STEP_COMPOSE_PARAMS, json!({ "track_id": track_id }));
        JobRepo::update_progress(
            &self.pool,
            job_id,
            PROGRESS_COMPOSE_PARAMS,
            STEP_COMPOSE_PARAMS,
        )
        .await?;
        let (request, style) = self.compose_request(payload, &track, &asset.storage_key);
        spans.close(
            span,
            json!({
                "style": &style,
                "voice_gender": &request.voice_gender,
                "audio_url": &request.audio_url,
            }),
        );

        // -- music_generate --
        let span = spans.open(STEP_MUSIC_GENERATE, json!({ "style": &style }));
        JobRepo::update_progress(
            &self.pool,
            job_id,
            PROGRESS_GENERATE_START,
            STEP_MUSIC_GENERATE,
        )
        .await?;
        let submit = self.chain.submit_generate(&request).await?;
        tracing::info!(
            job_id,
            provider = %submit.provider_name,
            task_id = %submit.task_id,
            "Provider accepted generation task",
        );
        let completed = self.poll_until_settled(job_id, &submit).await?;
        spans.close(
            span,
            json!({
                "task_id": &submit.task_id,
                "provider": &submit.provider_name,
                "variant_count": completed.variants.len(),
            }),
        );

        // -- ab_eval --
        let span = spans.open(STEP_AB_EVAL, json!({ "track_id": track_id }));
        JobRepo::update_progress(&self.pool, job_id, PROGRESS_AB_EVAL, STEP_AB_EVAL).await?;
        let batch_index = TrackRepo::next_batch_index(&self.pool, track_id).await?;
        for variant in &completed.variants {
            let row = TrackVariantRepo::create(
                &self.pool,
                &CreateTrackVariant {
                    track_id,
                    variant: variant.variant.clone(),
                    batch_index,
                    audio_url: variant.audio_url.clone(),
                    image_url: variant.image_url.clone(),
                    image_large_url: variant.image_large_url.clone(),
                    duration_secs: variant.duration_secs,
                    provider: submit.provider_name.clone(),
                    similarity_score: None,
                    quality_score: None,
                },
            )
            .await?;

            let download = DownloadJobPayload {
                variant_id: row.id,
                track_id,
                variant: row.variant.clone(),
                batch_index,
                source_url: variant.audio_url.clone(),
                image_url: variant.image_url.clone(),
                image_large_url: variant.image_large_url.clone(),
            };
            // The generation itself already succeeded; losing a download
            // enqueue must not fail the job. Log and move on.
            match serde_json::to_value(&download) {
                Ok(body) => {
                    if let Err(e) = self
                        .queue
                        .enqueue(DOWNLOAD_JOB, body, EnqueueOptions::download())
                        .await
                    {
                        tracing::error!(
                            variant_id = row.id,
                            error = %e,
                            "Failed to enqueue download job",
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(
                        variant_id = row.id,
                        error = %e,
                        "Failed to serialize download payload",
                    );
                }
            }
        }
        spans.close(
            span,
            json!({
                "batch_index": batch_index,
                "variant_count": completed.variants.len(),
            }),
        );

        // -- finalize --
        TrackRepo::set_ready(&self.pool, track_id, &style).await?;
        JobRepo::complete(
            &self.pool,
            job_id,
            &json!({
                "task_id": &submit.task_id,
                "provider": &submit.provider_name,
                "variant_count": completed.variants.len(),
            }),
        )
        .await?;

        Ok(GenerationOutcome {
            task_id: submit.task_id,
            provider: submit.provider_name,
            variant_count: completed.variants.len(),
        })
    }

    /// Resolve the provider request from the payload, the track row, and
    /// the stored input asset key.
    fn compose_request(
        &self,
        payload: &GenerateJobPayload,
        track: &Track,
        asset_key: &str,
    ) -> (GenerateRequest, String) {
        let audio_url = source_audio_url(
            self.storage.cdn_base_url.as_deref(),
            &self.storage.endpoint,
            &self.storage.bucket,
            asset_key,
        );
        let style = payload
            .style
            .clone()
            .or_else(|| track.style.clone())
            .unwrap_or_else(|| DEFAULT_STYLE.to_string());
        let request = GenerateRequest {
            audio_url,
            style: style.clone(),
            lyrics: payload.lyrics.clone(),
            title: Some(resolve_title(track.title.as_deref())),
            voice_gender: payload
                .voice_type
                .and_then(|v| v.provider_code())
                .map(str::to_string),
            exclude_styles: payload.exclude_styles.clone(),
            trim_start_ms: payload.trim_start_ms,
            trim_end_ms: payload.trim_end_ms,
        };
        (request, style)
    }

    /// Poll the accepting adapter until the task completes or fails, or
    /// the attempt budget runs out.
    ///
    /// Progress climbs from 30 towards 80 as the budget is consumed. The
    /// budget raises [`PipelineError::PollTimeout`], which is not the same
    /// condition as a vendor-reported failure even though both surface the
    /// same external code.
    async fn poll_until_settled(
        &self,
        job_id: DbId,
        submit: &ChainSubmit,
    ) -> Result<TaskResult, PipelineError> {
        for attempt in 1..=self.max_poll_attempts {
            tokio::time::sleep(self.poll_interval).await;

            let result = self
                .chain
                .query_task(&submit.provider_name, &submit.task_id)
                .await?;
            JobRepo::update_progress(
                &self.pool,
                job_id,
                polling_progress(attempt, self.max_poll_attempts),
                STEP_MUSIC_GENERATE,
            )
            .await?;

            match result.status {
                TaskStatus::Completed => return Ok(result),
                TaskStatus::Failed => {
                    return Err(PipelineError::TaskFailed {
                        message: result
                            .error
                            .unwrap_or_else(|| "provider reported task failure".to_string()),
                    });
                }
                TaskStatus::Pending | TaskStatus::Processing => {
                    tracing::debug!(
                        job_id,
                        task_id = %submit.task_id,
                        attempt,
                        status = ?result.status,
                        "Provider task still in flight",
                    );
                }
            }
        }

        Err(PipelineError::PollTimeout {
            attempts: self.max_poll_attempts,
        })
    }
}

//! Credential-free mock provider.
//!
//! Selected at construction time when no vendor API key is configured,
//! instead of branching inside the real adapters. Task completion is
//! derived purely from wall-clock time elapsed since a timestamp embedded
//! in the synthetic task id, so the full pipeline (submission, polling,
//! variant persistence, downloads) runs without any vendor account.

use std::time::Duration;

use crate::{
    GenerateRequest, MusicProvider, ProviderError, ProviderVariant, SubmitResponse, TaskResult,
    TaskStatus,
};

/// Elapsed time during which a mock task reports `Pending`.
const DEFAULT_PENDING_WINDOW: Duration = Duration::from_secs(4);
/// Elapsed time (from submission) after which a mock task completes.
const DEFAULT_COMPLETE_AFTER: Duration = Duration::from_secs(12);

/// Time-driven stand-in for a vendor adapter.
pub struct MockProvider {
    name: String,
    pending_window: Duration,
    complete_after: Duration,
}

impl MockProvider {
    /// Create a mock standing in for the named vendor, with the default
    /// simulation windows (a few seconds of `Pending`, completion after
    /// roughly ten).
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_windows(name, DEFAULT_PENDING_WINDOW, DEFAULT_COMPLETE_AFTER)
    }

    /// Create a mock with explicit phase windows. Tests use millisecond
    /// windows so the full pending/processing/completed cycle runs fast.
    pub fn with_windows(
        name: impl Into<String>,
        pending_window: Duration,
        complete_after: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            pending_window,
            complete_after,
        }
    }

    fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Recover the submission instant embedded in a synthetic task id.
    fn submitted_at(task_id: &str) -> Result<i64, ProviderError> {
        task_id
            .strip_prefix("mock-")
            .and_then(|raw| raw.parse::<i64>().ok())
            .ok_or_else(|| ProviderError::UnknownTask(task_id.to_string()))
    }

    fn placeholder_variants(task_id: &str) -> Vec<ProviderVariant> {
        ["A", "B"]
            .iter()
            .map(|label| ProviderVariant {
                variant: label.to_string(),
                audio_url: format!(
                    "https://static.songforge.dev/mock/{task_id}-{}.mp3",
                    label.to_lowercase()
                ),
                image_url: Some(format!(
                    "https://static.songforge.dev/mock/{task_id}-{}.jpg",
                    label.to_lowercase()
                )),
                image_large_url: Some(format!(
                    "https://static.songforge.dev/mock/{task_id}-{}_large.jpg",
                    label.to_lowercase()
                )),
                duration_secs: Some(30.0),
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl MusicProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit_generate(
        &self,
        _request: &GenerateRequest,
    ) -> Result<SubmitResponse, ProviderError> {
        Ok(SubmitResponse {
            task_id: format!("mock-{}", Self::now_millis()),
        })
    }

    async fn query_task(&self, task_id: &str) -> Result<TaskResult, ProviderError> {
        let submitted_at = Self::submitted_at(task_id)?;
        let elapsed =
            Duration::from_millis(Self::now_millis().saturating_sub(submitted_at).max(0) as u64);

        let (status, variants) = if elapsed < self.pending_window {
            (TaskStatus::Pending, Vec::new())
        } else if elapsed < self.complete_after {
            (TaskStatus::Processing, Vec::new())
        } else {
            (TaskStatus::Completed, Self::placeholder_variants(task_id))
        };

        Ok(TaskResult {
            status,
            variants,
            error: None,
        })
    }
}

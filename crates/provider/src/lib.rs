//! Music-generation provider abstraction.
//!
//! This crate isolates everything vendor-specific behind the
//! [`MusicProvider`] trait:
//!
//! - [`suno::SunoApi`] -- primary vendor adapter.
//! - [`mureka::MurekaApi`] -- legacy vendor adapter.
//! - [`mock::MockProvider`] -- credential-free stand-in that derives task
//!   state from wall-clock time, so the pipeline runs end-to-end without a
//!   vendor account.
//! - [`chain::ProviderChain`] -- ordered fallback over adapters with a
//!   bounded per-adapter retry budget.
//!
//! Adapters normalize vendor responses into [`TaskResult`]s; the rest of
//! the pipeline never sees a vendor wire format.

pub mod chain;
pub mod mock;
pub mod mureka;
pub mod suno;

use async_trait::async_trait;

/// A generation request, already resolved to provider-level terms.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// Externally-reachable URL of the user's source audio.
    pub audio_url: String,
    /// Style/tag string driving the generation.
    pub style: String,
    pub lyrics: Option<String>,
    pub title: Option<String>,
    /// Compact voice-gender code ("f"/"m"); `None` means instrumental.
    pub voice_gender: Option<String>,
    pub exclude_styles: Vec<String>,
    /// Optional trim segment of the source audio, in milliseconds.
    pub trim_start_ms: Option<i64>,
    pub trim_end_ms: Option<i64>,
}

/// Response returned by a successful submission.
#[derive(Debug, Clone)]
pub struct SubmitResponse {
    /// Vendor-assigned task identifier, only meaningful to the adapter
    /// that produced it.
    pub task_id: String,
}

/// Normalized vendor task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One normalized rendition within a completed task.
#[derive(Debug, Clone)]
pub struct ProviderVariant {
    /// "A" for the vendor's first result, "B" for the second.
    pub variant: String,
    pub audio_url: String,
    pub image_url: Option<String>,
    pub image_large_url: Option<String>,
    pub duration_secs: Option<f64>,
}

/// Result of polling a task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub status: TaskStatus,
    /// Populated only when `status` is [`TaskStatus::Completed`].
    pub variants: Vec<ProviderVariant>,
    /// Vendor-reported failure detail, when `status` is
    /// [`TaskStatus::Failed`].
    pub error: Option<String>,
}

/// Errors from the provider layer.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The vendor returned a non-2xx status code.
    #[error("Provider API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The vendor answered 2xx but reported a business-level error code.
    #[error("Provider rejected request (code {code}): {message}")]
    Vendor { code: i64, message: String },

    /// A task id the adapter does not recognize.
    #[error("Unknown task id: {0}")]
    UnknownTask(String),

    /// A provider name the chain does not hold.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Every adapter in the chain spent its retry budget.
    #[error("All providers exhausted: {0}")]
    Exhausted(String),
}

/// Uniform interface over music-generation vendors.
#[async_trait]
pub trait MusicProvider: Send + Sync {
    /// Stable provider name, used to route `query_task` back to the
    /// adapter that accepted a submission.
    fn name(&self) -> &str;

    /// Submit a generation request, returning the vendor task id.
    async fn submit_generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<SubmitResponse, ProviderError>;

    /// Poll a previously submitted task.
    async fn query_task(&self, task_id: &str) -> Result<TaskResult, ProviderError>;
}

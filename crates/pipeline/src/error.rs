//! Pipeline error taxonomy.

use songforge_core::generation::ERROR_CODE_PROVIDER;
use songforge_core::types::DbId;
use songforge_provider::ProviderError;

use crate::queue::QueueError;
use crate::storage::StorageError;

/// Errors raised by the job handlers.
///
/// The provider-failure causes stay distinct internally (a chain
/// exhaustion, a vendor-reported task failure, and a poll-budget timeout
/// are different conditions) even though they collapse into one external
/// error code on the job row (see [`PipelineError::external_code`]).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Provider task failed: {message}")]
    TaskFailed { message: String },

    #[error("Timed out waiting for provider task after {attempts} polls")]
    PollTimeout { attempts: u32 },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Track {track_id} has no input asset")]
    MissingInput { track_id: DbId },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// The error code written to the job row.
    ///
    /// Every failure cause currently collapses into the provider code;
    /// clients distinguish causes by the message, not the code.
    pub fn external_code(&self) -> &'static str {
        ERROR_CODE_PROVIDER
    }
}

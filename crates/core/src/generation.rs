//! Generation pipeline constants and pure decision logic.
//!
//! The generation job handler in `songforge-pipeline` drives a track through
//! a fixed sequence of named steps. The step names, progress milestones,
//! polling budget, and the small pieces of logic that can be decided without
//! I/O (progress interpolation, voice mapping, source-URL construction) all
//! live here.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Step names
// ---------------------------------------------------------------------------

/// Input-asset validation step.
pub const STEP_AUDIO_CHECK: &str = "audio_check";
/// Provider request construction step.
pub const STEP_COMPOSE_PARAMS: &str = "compose_params";
/// Provider submission and polling step.
pub const STEP_MUSIC_GENERATE: &str = "music_generate";
/// Variant persistence and download fan-out step.
pub const STEP_AB_EVAL: &str = "ab_eval";

// ---------------------------------------------------------------------------
// Progress milestones
// ---------------------------------------------------------------------------

/// Progress after the input asset has been validated.
pub const PROGRESS_AUDIO_CHECK: i16 = 10;
/// Progress after provider parameters have been composed.
pub const PROGRESS_COMPOSE_PARAMS: i16 = 20;
/// Progress when the provider submission is accepted; polling starts here.
pub const PROGRESS_GENERATE_START: i16 = 30;
/// Ceiling for interpolated progress while polling.
pub const PROGRESS_GENERATE_CAP: i16 = 80;
/// Progress while variants are persisted and download jobs enqueued.
pub const PROGRESS_AB_EVAL: i16 = 90;
/// Terminal progress for a succeeded job.
pub const PROGRESS_DONE: i16 = 100;

// ---------------------------------------------------------------------------
// Polling budget
// ---------------------------------------------------------------------------

/// Fixed delay between provider task polls.
pub const POLL_INTERVAL_SECS: u64 = 5;
/// Maximum number of polls before the generation times out (~5 minutes).
pub const MAX_POLL_ATTEMPTS: u32 = 60;

/// External error code surfaced on any generation failure.
///
/// Both provider failures and poll-budget timeouts collapse into this one
/// code at the job-row level; the internal error variants stay distinct.
pub const ERROR_CODE_PROVIDER: &str = "GEN_PROVIDER_ERROR";

// ---------------------------------------------------------------------------
// Variant labels
// ---------------------------------------------------------------------------

/// Label of the first variant in a batch.
pub const VARIANT_A: &str = "A";
/// Label of the second variant in a batch.
pub const VARIANT_B: &str = "B";

/// Map a vendor-assigned result position to a variant label.
///
/// Vendors return an ordered list; the first entry is always `A`, the
/// second `B`. Positions past the expected pair have no label.
pub fn variant_label(index: usize) -> Option<&'static str> {
    match index {
        0 => Some(VARIANT_A),
        1 => Some(VARIANT_B),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Polling progress interpolation
// ---------------------------------------------------------------------------

/// Interpolate job progress during the provider poll loop.
///
/// Progress climbs linearly from [`PROGRESS_GENERATE_START`] towards
/// [`PROGRESS_GENERATE_CAP`] as `attempt` approaches `max_attempts`, and
/// never exceeds the cap.
pub fn polling_progress(attempt: u32, max_attempts: u32) -> i16 {
    if max_attempts == 0 {
        return PROGRESS_GENERATE_CAP;
    }
    let span = (PROGRESS_GENERATE_CAP - PROGRESS_GENERATE_START) as u64;
    let climbed = (span * attempt as u64 / max_attempts as u64) as i16;
    (PROGRESS_GENERATE_START + climbed).min(PROGRESS_GENERATE_CAP)
}

// ---------------------------------------------------------------------------
// Voice type mapping
// ---------------------------------------------------------------------------

/// Vocal preference selected in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceType {
    Female,
    Male,
    Instrumental,
}

impl VoiceType {
    /// Return the UI string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
            Self::Instrumental => "instrumental",
        }
    }

    /// Parse from the UI string, returning an error for unknown values.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "female" => Ok(Self::Female),
            "male" => Ok(Self::Male),
            "instrumental" => Ok(Self::Instrumental),
            other => Err(CoreError::Validation(format!(
                "Unknown voice type: '{other}'. Must be one of: female, male, instrumental"
            ))),
        }
    }

    /// Map to the compact code the provider APIs expect.
    ///
    /// Instrumental tracks omit the field entirely.
    pub fn provider_code(&self) -> Option<&'static str> {
        match self {
            Self::Female => Some("f"),
            Self::Male => Some("m"),
            Self::Instrumental => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Source audio URL
// ---------------------------------------------------------------------------

/// Build the externally-reachable URL for a stored input asset.
///
/// Prefers the public CDN base when one is configured; otherwise falls back
/// to addressing the object through the storage endpoint and bucket.
pub fn source_audio_url(
    cdn_base_url: Option<&str>,
    storage_endpoint: &str,
    bucket: &str,
    key: &str,
) -> String {
    match cdn_base_url {
        Some(base) => format!("{}/{key}", base.trim_end_matches('/')),
        None => format!(
            "{}/{bucket}/{key}",
            storage_endpoint.trim_end_matches('/'),
        ),
    }
}

/// Resolve the title passed to the provider from the track's title.
pub fn resolve_title(title: Option<&str>) -> String {
    match title.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => "Untitled".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Process configuration resolved once from the environment.
//!
//! Every binary constructs a [`Config`] at startup and hands the relevant
//! sections to the collaborators it builds. Nothing in this workspace reads
//! environment variables after startup.

use crate::error::CoreError;

/// Top-level configuration for a worker process.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Number of concurrent queue-job executions.
    pub worker_concurrency: usize,
    /// Seconds between cleanup sweeps.
    pub cleanup_interval_secs: u64,
    pub storage: StorageConfig,
    pub provider: ProviderConfig,
    pub trace: TraceConfig,
}

/// Object storage and public-URL settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// S3-compatible endpoint, also the fallback base for public URLs.
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    /// Public CDN base; preferred over the endpoint when building the
    /// source audio URL handed to providers.
    pub cdn_base_url: Option<String>,
}

/// Music generation vendor settings.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Missing key selects the mock provider in place of the real adapter.
    pub suno_api_key: Option<String>,
    pub suno_base_url: String,
    pub mureka_api_key: Option<String>,
    pub mureka_base_url: String,
    /// When false, only the primary provider is used (no chain fallback).
    pub enable_fallback: bool,
    /// Submission attempts per adapter before falling through.
    pub submit_max_retries: u32,
    /// Base delay between submission attempts within one adapter.
    pub submit_backoff_ms: u64,
}

/// Trace collector settings. Both fields absent means tracing is a no-op.
#[derive(Debug, Clone)]
pub struct TraceConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl Config {
    /// Resolve the full configuration from the process environment.
    pub fn from_env() -> Result<Self, CoreError> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            worker_concurrency: parsed("WORKER_CONCURRENCY", 2)?,
            cleanup_interval_secs: parsed("CLEANUP_INTERVAL_SECS", 3600)?,
            storage: StorageConfig {
                endpoint: required("STORAGE_ENDPOINT")?,
                region: optional("STORAGE_REGION").unwrap_or_else(|| "us-east-1".into()),
                bucket: required("STORAGE_BUCKET")?,
                cdn_base_url: optional("CDN_BASE_URL"),
            },
            provider: ProviderConfig {
                suno_api_key: optional("SUNO_API_KEY"),
                suno_base_url: optional("SUNO_BASE_URL")
                    .unwrap_or_else(|| "https://api.sunoapi.org".into()),
                mureka_api_key: optional("MUREKA_API_KEY"),
                mureka_base_url: optional("MUREKA_BASE_URL")
                    .unwrap_or_else(|| "https://api.mureka.ai".into()),
                enable_fallback: parsed("PROVIDER_FALLBACK", false)?,
                submit_max_retries: parsed("PROVIDER_SUBMIT_RETRIES", 3)?,
                submit_backoff_ms: parsed("PROVIDER_SUBMIT_BACKOFF_MS", 2000)?,
            },
            trace: TraceConfig {
                endpoint: optional("TRACE_ENDPOINT"),
                api_key: optional("TRACE_API_KEY"),
            },
        })
    }
}

fn required(name: &str) -> Result<String, CoreError> {
    std::env::var(name).map_err(|_| CoreError::Config(format!("{name} must be set")))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parsed<T>(name: &str, default: T) -> Result<T, CoreError>
where
    T: std::str::FromStr,
{
    match optional(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| CoreError::Config(format!("{name} has an invalid value: '{raw}'"))),
    }
}

//! The asynchronous generation pipeline.
//!
//! Three job handlers drive everything the queue delivers:
//!
//! - [`generate::GenerationHandler`] -- orchestrates one generation run:
//!   step sequence, provider submission/polling, variant persistence,
//!   download fan-out.
//! - [`download::DownloadHandler`] -- archives one variant's vendor-hosted
//!   media into object storage, with independent per-asset status.
//! - [`cleanup::CleanupHandler`] -- hard-deletes soft-deleted tracks past
//!   their retention window.
//!
//! The collaborators the handlers need (object storage, job queue, trace
//! collector) are traits owned by this crate, each with a production
//! implementation and an in-memory one for tests and local development.

pub mod cleanup;
pub mod download;
pub mod error;
pub mod generate;
pub mod queue;
pub mod storage;
pub mod trace;

pub use cleanup::CleanupHandler;
pub use download::{DownloadHandler, DownloadJobPayload};
pub use error::PipelineError;
pub use generate::{GenerateJobPayload, GenerationHandler};

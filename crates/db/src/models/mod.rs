pub mod asset;
pub mod job;
pub mod queue_job;
pub mod status;
pub mod track;
pub mod track_variant;

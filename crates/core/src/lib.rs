//! Shared types, configuration, and pure generation-pipeline logic.
//!
//! This crate has no internal dependencies and no I/O. Everything that can
//! be decided without touching the database, the object store, or a vendor
//! API lives here so that both the worker and (future) API binaries agree
//! on the same constants and decision rules.

pub mod config;
pub mod error;
pub mod generation;
pub mod scoring;
pub mod types;

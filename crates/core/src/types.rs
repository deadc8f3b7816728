//! Primitive aliases shared by every crate in the workspace.

/// Primary key of a persisted row (`BIGSERIAL` in Postgres).
pub type DbId = i64;

/// UTC wall-clock instant; no other timestamp flavor is stored or compared.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

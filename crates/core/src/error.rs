/// Errors from the shared core: bad user-facing values and broken
/// process configuration. Each downstream layer defines its own richer
/// error type.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

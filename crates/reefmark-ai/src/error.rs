//! Error types for the inference subsystem.

use reefmark_core::ReefError;
use thiserror::Error;

/// Errors that can occur in inference operations.
#[derive(Debug, Error)]
pub enum AiError {
    /// The service could not be reached or answered with a failure.
    #[error("Inference request failed: {0}")]
    RequestFailed(String),

    /// The response was missing fields or had the wrong shape.
    #[error("Malformed inference response: {0}")]
    MalformedResponse(String),

    /// The backend does not offer this operation.
    #[error("Unsupported inference operation: {0}")]
    Unsupported(String),

    /// Input rejected before any request was made.
    #[error("Preprocessing error: {0}")]
    PreprocessError(String),

    #[error(transparent)]
    Core(#[from] ReefError),
}

/// Result type alias for inference operations.
pub type AiResult<T> = std::result::Result<T, AiError>;

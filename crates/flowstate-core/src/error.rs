//! Error types for the flowstate core.

use thiserror::Error;

/// Errors that can occur while encoding or decoding link-state objects.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("malformed entry: {0}")]
    MalformedEntry(String),

    #[error("unknown object class: {0}")]
    UnknownObjectClass(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

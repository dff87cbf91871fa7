//! Error types for the sync module.

use flowstate_core::PortId;
use thiserror::Error;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Message is well-formed but not valid synchronization input.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Payload could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] flowstate_core::CoreError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// No flow is bound to the port.
    #[error("peer not connected on port {0}")]
    PeerNotConnected(PortId),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

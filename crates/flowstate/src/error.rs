//! Error types for the forwarding facade.

use flowstate_core::{CoreError, PortId};
use flowstate_sync::SyncError;
use thiserror::Error;

/// Errors that can occur inside facade operations.
///
/// The inbound operations report outcomes as booleans; these errors are
/// what gets logged on the way to `false`.
#[derive(Debug, Error)]
pub enum ForwardingError {
    /// Encoding or decoding error.
    #[error("encoding error: {0}")]
    Core(#[from] CoreError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// No locally originated flow is bound to the port.
    #[error("unknown port: {0}")]
    UnknownPort(PortId),
}

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, ForwardingError>;

//! Unified error type for the BoardSync server.
//!
//! Each layer keeps its own error enum; [`BoardSyncError`] wraps them so
//! the server and embedding applications can use `?` across layers.

use boardsync_hub::HubError;
use boardsync_protocol::{ProtocolError, TaskId};
use boardsync_session::AuthError;
use boardsync_transport::TransportError;

/// Errors from the in-memory [`TaskBoard`](crate::TaskBoard).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// The task exists but belongs to another owner.
    #[error("access to task {0} denied")]
    AccessDenied(TaskId),
}

/// Top-level error for BoardSync.
#[derive(Debug, thiserror::Error)]
pub enum BoardSyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Startup configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

//! Error types for game client operations.

use crate::{payload::PayloadError, session::SessionError};

/// Errors returned by [`GameClient`](super::GameClient) operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connecting or writing failed.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// An outbound message could not be serialized.
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] PayloadError),
}

impl ClientError {
    /// Whether the error only means there is currently no connection.
    #[must_use]
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::Session(SessionError::NotConnected))
    }
}

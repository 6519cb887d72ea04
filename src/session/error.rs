//! Errors returned by session operations.

use std::io;

use super::SessionState;
use crate::{codec::CodecError, payload::PayloadError};

/// Errors returned by [`Session`](super::Session) operations.
///
/// Failures of the background connection, such as a lost socket or missed
/// heartbeats, are not returned here; they surface as state transitions and
/// [`SessionEvent`](super::SessionEvent)s.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session has no live connection to write to.
    #[error("session is not connected")]
    NotConnected,
    /// The session has been closed and cannot be reused.
    #[error("session is closed")]
    Closed,
    /// `connect` was called while the session was not disconnected.
    #[error("cannot connect while {0}")]
    InvalidState(SessionState),
    /// The initial connection attempt failed.
    #[error("failed to connect: {0}")]
    Connect(#[source] io::Error),
    /// Writing to the socket failed; the connection is being recovered.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// The frame could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The message could not be serialized.
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

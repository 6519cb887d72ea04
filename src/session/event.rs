//! Session states and the lifecycle events reported to the application.

use std::fmt;

use crate::frame::Frame;

/// Connection state of a [`Session`](super::Session).
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Reconnecting -> Connected
///                                   |              |
///                                   +--------------+--> Disconnected
/// ```
///
/// `Closed` is terminal and reachable from every state via
/// [`Session::close`](super::Session::close).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No connection and no attempt in progress.
    #[default]
    Disconnected,
    /// An explicit [`connect`](super::Session::connect) is in flight.
    Connecting,
    /// Frames flow and heartbeats run.
    Connected,
    /// The connection was lost and is being re-established.
    Reconnecting,
    /// Shut down by [`close`](super::Session::close); final.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        })
    }
}

/// Why the session reached `Disconnected`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The explicit `connect` call failed.
    ConnectFailed,
    /// The server closed the connection.
    ServerClosed,
    /// A read or write on the socket failed.
    Transport,
    /// The server sent bytes that violate the framing rules.
    ProtocolViolation,
    /// No heartbeat reply arrived within the timeout.
    HeartbeatTimeout,
    /// Every reconnection attempt failed.
    ReconnectExhausted { attempts: u32 },
}

impl DisconnectReason {
    /// Whether the session gave up after trying to recover.
    #[must_use]
    pub const fn is_terminal(&self) -> bool { matches!(self, Self::ReconnectExhausted { .. }) }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => f.write_str("connection attempt failed"),
            Self::ServerClosed => f.write_str("server closed the connection"),
            Self::Transport => f.write_str("socket error"),
            Self::ProtocolViolation => f.write_str("malformed frame from server"),
            Self::HeartbeatTimeout => f.write_str("heartbeat timed out"),
            Self::ReconnectExhausted { attempts } => {
                write!(f, "gave up after {attempts} reconnection attempts")
            }
        }
    }
}

/// Lifecycle notification delivered through the dispatch queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A connection was established, initially or after reconnecting.
    Connected,
    /// The session stopped without being closed.
    Disconnected(DisconnectReason),
    /// An established connection was lost and recovery has started.
    ///
    /// Reported once per outage; `attempt` is the first attempt number and
    /// `max_attempts` the configured limit.
    Reconnecting {
        /// Attempt number the outage starts with.
        attempt: u32,
        /// Configured attempt limit.
        max_attempts: u32,
    },
}

/// Item handed from the I/O side to the application tick.
#[derive(Clone, Debug)]
pub enum Inbound {
    /// A frame read from the server.
    Frame(Frame),
    /// A lifecycle change of the session.
    Event(SessionEvent),
}

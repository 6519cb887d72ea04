//! Connection state machine for a game server session.
//!
//! A [`Session`] owns the TCP connection. After [`Session::connect`]
//! succeeds, a background supervisor task reads frames into the dispatch
//! queue, sends periodic pings, and replaces the connection when it is lost,
//! according to the [`ReconnectPolicy`]. Everything the application needs to
//! react to arrives through the [`DispatchReceiver`] returned by
//! [`Session::new`] as [`Inbound`] items: received frames and
//! [`SessionEvent`]s, in the order they happened. Heartbeat replies are
//! queued too, after they have updated [`Session::latency`].
//!
//! Failures of the background connection never surface as errors from
//! session methods. They appear as state transitions observable through
//! [`Session::subscribe_state`] and as events in the queue.

mod config;
mod connector;
mod driver;
mod error;
mod event;
mod heartbeat;

use std::{fmt, sync::Arc, time::Duration};

use bytes::Bytes;
use log::{info, warn};
use tokio::{select, sync::watch};

pub use self::{
    config::{Backoff, ReconnectPolicy, ServerAddr, SessionConfig},
    connector::{Connector, SocketOptions, TcpConnector},
    error::SessionError,
    event::{DisconnectReason, Inbound, SessionEvent, SessionState},
};
#[cfg(test)]
pub(crate) use self::connector::MockConnector;
use self::driver::{Shared, supervise};
use crate::{
    frame::{Frame, PacketType},
    queue::{DispatchReceiver, dispatch_queue},
};

/// Handle to a game server connection and its background tasks.
///
/// Dropping the handle stops the background tasks; call
/// [`close`](Self::close) to also wait for them to finish.
///
/// # Examples
///
/// ```no_run
/// use tickwire::{
///     frame::PacketType,
///     session::{Inbound, Session, SessionConfig},
/// };
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), tickwire::session::SessionError> {
/// let (session, mut inbound) = Session::new(SessionConfig::new("127.0.0.1", 3000));
/// session.connect().await?;
/// session.send(PacketType::GameStart, Vec::new()).await?;
/// for item in inbound.drain_all() {
///     if let Inbound::Frame(frame) = item {
///         println!("received {} frame", frame.packet_type());
///     }
/// }
/// session.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Session<K: Connector = TcpConnector> {
    shared: Arc<Shared<K>>,
}

impl Session<TcpConnector> {
    /// Create a disconnected session that connects over plain TCP.
    #[must_use]
    pub fn new(config: SessionConfig) -> (Self, DispatchReceiver<Inbound>) {
        let connector = TcpConnector::new(config.socket);
        Self::with_connector(config, connector)
    }
}

impl<K: Connector> fmt::Debug for Session<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl<K: Connector> Session<K> {
    /// Create a disconnected session using `connector` for every connection
    /// attempt.
    #[must_use]
    pub fn with_connector(config: SessionConfig, connector: K) -> (Self, DispatchReceiver<Inbound>) {
        let (tx, rx) = dispatch_queue();
        let shared = Arc::new(Shared::new(config.normalized(), connector, tx));
        (Self { shared }, rx)
    }

    /// Effective configuration after normalization.
    #[must_use]
    pub fn config(&self) -> &SessionConfig { &self.shared.config }

    /// Connect to the configured server.
    ///
    /// # Errors
    ///
    /// See [`connect_to`](Self::connect_to).
    pub async fn connect(&self) -> Result<(), SessionError> {
        self.connect_to(self.shared.config.server.clone()).await
    }

    /// Connect to `addr`, which also becomes the reconnection target.
    ///
    /// Valid only while `Disconnected`. A failed attempt returns the session
    /// to `Disconnected`, queues a
    /// [`Disconnected(ConnectFailed)`](DisconnectReason::ConnectFailed) event
    /// and is not retried.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] if the session is not
    /// disconnected, [`SessionError::Closed`] after [`close`](Self::close),
    /// or [`SessionError::Connect`] if the connection attempt fails.
    pub async fn connect_to(&self, addr: ServerAddr) -> Result<(), SessionError> {
        let shared = &self.shared;
        if shared.shutdown.is_cancelled() {
            return Err(SessionError::Closed);
        }
        let mut claimed = false;
        shared.state.send_if_modified(|state| {
            claimed = *state == SessionState::Disconnected;
            if claimed {
                *state = SessionState::Connecting;
            }
            claimed
        });
        if !claimed {
            return Err(match self.state() {
                SessionState::Closed => SessionError::Closed,
                state => SessionError::InvalidState(state),
            });
        }

        *shared.target.lock().await = addr.clone();
        info!("connecting to {addr}");
        let result = select! {
            biased;
            () = shared.shutdown.cancelled() => return Err(SessionError::Closed),
            result = shared.connector.connect(addr.clone()) => result,
        };
        let stream = match result {
            Ok(stream) => stream,
            Err(err) => {
                warn!("failed to connect to {addr}: {err}");
                shared.set_state(SessionState::Disconnected);
                shared.emit(SessionEvent::Disconnected(DisconnectReason::ConnectFailed));
                return Err(SessionError::Connect(err));
            }
        };

        let (reader, lost) = shared.install(stream).await;
        if shared.shutdown.is_cancelled() {
            shared.drop_link().await;
            return Err(SessionError::Closed);
        }
        info!("connected to {addr}");
        shared
            .tracker
            .spawn(supervise(Arc::clone(shared), reader, lost));
        Ok(())
    }

    /// Send `payload` in a frame of `packet_type`.
    ///
    /// # Errors
    ///
    /// See [`send_frame`](Self::send_frame).
    pub async fn send(
        &self,
        packet_type: PacketType,
        payload: impl Into<Bytes>,
    ) -> Result<(), SessionError> {
        self.send_frame(Frame::new(packet_type, payload)).await
    }

    /// Send one frame over the current connection.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] unless the session is
    /// `Connected`, [`SessionError::Codec`] if the frame exceeds the
    /// configured maximum, and [`SessionError::Io`] if the write fails. A
    /// failed write also starts connection recovery.
    pub async fn send_frame(&self, frame: Frame) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Connected => self.shared.write(frame).await,
            SessionState::Closed => Err(SessionError::Closed),
            _ => Err(SessionError::NotConnected),
        }
    }

    /// Stop all background work, release the socket and enter `Closed`.
    ///
    /// In-flight reads, writes and reconnection delays are cancelled. Safe to
    /// call more than once.
    pub async fn close(&self) {
        let shared = &self.shared;
        if !shared.shutdown.is_cancelled() {
            info!("closing session");
        }
        shared.shutdown.cancel();
        shared.tracker.close();
        shared.tracker.wait().await;
        shared.drop_link().await;
        shared.state.send_replace(SessionState::Closed);
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> SessionState { *self.shared.state.borrow() }

    /// Whether frames can be sent right now.
    #[must_use]
    pub fn is_connected(&self) -> bool { self.state() == SessionState::Connected }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> { self.shared.state.subscribe() }

    /// Most recent heartbeat round-trip time.
    #[must_use]
    pub fn latency(&self) -> Option<Duration> { self.shared.heartbeat.latency() }
}

impl<K: Connector> Drop for Session<K> {
    fn drop(&mut self) { self.shared.shutdown.cancel(); }
}

//! Application-facing game client.
//!
//! [`GameClient`] ties a [`Session`] to a [`Router`]. Network I/O runs on
//! background tasks; the application calls [`GameClient::tick`] once per
//! frame of its own loop to run every callback for frames and lifecycle
//! events that arrived since the previous tick. Callbacks therefore always
//! run on the caller's thread, never on an I/O task.

mod builder;
mod error;
mod hooks;

use std::time::Duration;

use bytes::Bytes;
use log::debug;

pub use self::{
    builder::{DEFAULT_PROTOCOL_VERSION, GameClientBuilder},
    error::ClientError,
    hooks::{ConnectedHook, DisconnectedHook, ReconnectingHook},
};
use self::hooks::LifecycleHooks;
use crate::{
    envelope::{Envelope, Response},
    frame::PacketType,
    messages::{InitialPayload, LocationUpdate, LocationUpdatePayload, handler},
    payload::{BincodeCodec, Message, PayloadCodec},
    queue::DispatchReceiver,
    router::{HandlerResult, Router},
    session::{
        Connector,
        DisconnectReason,
        Inbound,
        ServerAddr,
        Session,
        SessionState,
        TcpConnector,
    },
};

/// Game server client driven by the application's tick.
///
/// # Examples
///
/// ```no_run
/// use tickwire::{GameClient, messages::LocationUpdate};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), tickwire::ClientError> {
/// let mut client = GameClient::builder().server("127.0.0.1", 3000).build();
/// client.on_location(|update: LocationUpdate| {
///     println!("{} users", update.users.len());
///     Ok(())
/// });
/// client.connect().await?;
/// client.send_location(1.0, 2.0).await?;
/// loop {
///     client.tick();
///     # break;
/// }
/// client.close().await;
/// # Ok(())
/// # }
/// ```
pub struct GameClient<C = BincodeCodec, K = TcpConnector>
where
    C: PayloadCodec + Clone,
    K: Connector,
{
    session: Session<K>,
    inbound: DispatchReceiver<Inbound>,
    router: Router<C>,
    hooks: LifecycleHooks,
    codec: C,
    sender_id: String,
    protocol_version: String,
}

impl GameClient<BincodeCodec, TcpConnector> {
    /// Start building a client.
    #[must_use]
    pub fn builder() -> GameClientBuilder<BincodeCodec> { GameClientBuilder::new() }
}

impl<C, K> std::fmt::Debug for GameClient<C, K>
where
    C: PayloadCodec + Clone,
    K: Connector,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameClient")
            .field("session", &self.session)
            .field("sender_id", &self.sender_id)
            .field("protocol_version", &self.protocol_version)
            .finish_non_exhaustive()
    }
}

impl<C, K> GameClient<C, K>
where
    C: PayloadCodec + Clone,
    K: Connector,
{
    /// Connect to the configured server.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Session`] if the session is not disconnected
    /// or the connection attempt fails. The failure is also reported to
    /// [`on_disconnected`](Self::on_disconnected) callbacks on the next tick.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.session.connect().await?;
        Ok(())
    }

    /// Connect to `host:port` instead of the configured server.
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect).
    pub async fn connect_to(&self, host: impl Into<String>, port: u16) -> Result<(), ClientError> {
        self.session.connect_to(ServerAddr::new(host, port)).await?;
        Ok(())
    }

    /// Send `message` to the server handler `handler_id`.
    ///
    /// The message is serialized, wrapped in an [`Envelope`] carrying this
    /// client's sender id and protocol version, and sent as a `Normal` frame.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Serialize`] if encoding fails and
    /// [`ClientError::Session`] if the client is not connected or the write
    /// fails.
    pub async fn send<M: Message>(&self, handler_id: u32, message: &M) -> Result<(), ClientError> {
        let inner = self.codec.serialize(message)?;
        let envelope = Envelope::new(
            handler_id,
            self.sender_id.as_str(),
            self.protocol_version.as_str(),
            inner,
        );
        let payload = self.codec.serialize(&envelope)?;
        debug!(
            "sending {} byte envelope to handler {handler_id}",
            payload.len()
        );
        self.send_packet(PacketType::Normal, payload).await
    }

    /// Send a raw frame payload without an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Session`] if the client is not connected or
    /// the write fails.
    pub async fn send_packet(
        &self,
        packet_type: PacketType,
        payload: impl Into<Bytes>,
    ) -> Result<(), ClientError> {
        self.session.send(packet_type, payload).await?;
        Ok(())
    }

    /// Send the handshake to the [`INIT`](handler::INIT) handler.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_initial(&self, payload: &InitialPayload) -> Result<(), ClientError> {
        self.send(handler::INIT, payload).await
    }

    /// Report the local player's position.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_location(&self, x: f32, y: f32) -> Result<(), ClientError> {
        self.send(handler::LOCATION_UPDATE, &LocationUpdatePayload { x, y })
            .await
    }

    /// Register a callback for responses addressed to `handler_id`.
    pub fn register_handler<F>(&mut self, handler_id: u32, callback: F)
    where
        F: FnMut(&Response) -> HandlerResult + Send + 'static,
    {
        self.router.register_handler(handler_id, callback);
    }

    /// Register a callback for frames of `packet_type`, decoded as `M`.
    pub fn on_message<M, F>(&mut self, packet_type: PacketType, callback: F)
    where
        M: Message + 'static,
        F: FnMut(M) -> HandlerResult + Send + 'static,
    {
        self.router.on_message(packet_type, callback);
    }

    /// Register a callback for position broadcasts.
    ///
    /// An empty `Location` payload means no users are present and is
    /// delivered as [`LocationUpdate::default`]. Undecodable broadcasts are
    /// dropped by the router like any other undecodable frame.
    pub fn on_location<F>(&mut self, mut callback: F)
    where
        F: FnMut(LocationUpdate) -> HandlerResult + Send + 'static,
    {
        let codec = self.codec.clone();
        self.router.register_packet(PacketType::Location, move |frame| {
            let payload = frame.payload();
            if payload.is_empty() {
                return callback(LocationUpdate::default());
            }
            let update = codec.deserialize::<LocationUpdate>(payload)?;
            callback(update)
        });
    }

    /// Register a callback for every established connection, including
    /// successful reconnections.
    pub fn on_connected<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.hooks.connected.push(Box::new(callback));
    }

    /// Register a callback for the session stopping without
    /// [`close`](Self::close). [`DisconnectReason::is_terminal`] tells
    /// whether automatic recovery gave up.
    pub fn on_disconnected<F>(&mut self, callback: F)
    where
        F: FnMut(&DisconnectReason) + Send + 'static,
    {
        self.hooks.disconnected.push(Box::new(callback));
    }

    /// Register a callback for the start of connection recovery, called
    /// with the attempt number and the configured maximum.
    pub fn on_reconnecting<F>(&mut self, callback: F)
    where
        F: FnMut(u32, u32) + Send + 'static,
    {
        self.hooks.reconnecting.push(Box::new(callback));
    }

    /// Run callbacks for everything received since the last tick.
    ///
    /// Frames and lifecycle events are processed in arrival order. Items
    /// arriving during the tick wait for the next one. Returns the number of
    /// items processed.
    pub fn tick(&mut self) -> usize {
        let items = self.inbound.drain_all();
        let count = items.len();
        for item in items {
            match item {
                Inbound::Frame(frame) => {
                    self.router.dispatch(&frame);
                }
                Inbound::Event(event) => {
                    debug!("session event: {event:?}");
                    self.hooks.fire(&event);
                }
            }
        }
        count
    }

    /// Close the connection and stop all background work. Idempotent.
    pub async fn close(&self) { self.session.close().await; }

    /// Underlying session handle.
    #[must_use]
    pub fn session(&self) -> &Session<K> { &self.session }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> SessionState { self.session.state() }

    /// Most recent heartbeat round-trip time.
    #[must_use]
    pub fn latency(&self) -> Option<Duration> { self.session.latency() }

    /// Identity stamped on every outgoing envelope.
    #[must_use]
    pub fn sender_id(&self) -> &str { &self.sender_id }

    /// Protocol version stamped on every outgoing envelope.
    #[must_use]
    pub fn protocol_version(&self) -> &str { &self.protocol_version }
}

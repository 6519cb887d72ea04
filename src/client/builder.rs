//! Builder for [`GameClient`].

use std::time::Duration;

use super::{GameClient, hooks::LifecycleHooks};
use crate::{
    payload::{BincodeCodec, PayloadCodec},
    router::Router,
    session::{Connector, ReconnectPolicy, Session, SessionConfig, SocketOptions, TcpConnector},
};

/// Protocol version sent in every envelope unless overridden.
pub const DEFAULT_PROTOCOL_VERSION: &str = "1.0.0";

/// Builder for [`GameClient`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tickwire::{GameClient, session::ReconnectPolicy};
///
/// let client = GameClient::builder()
///     .server("127.0.0.1", 3000)
///     .heartbeat(Duration::from_secs(1), Duration::from_secs(5))
///     .reconnect(ReconnectPolicy::default())
///     .sender_id("device-1")
///     .build();
/// assert_eq!(client.sender_id(), "device-1");
/// ```
#[derive(Clone, Debug)]
pub struct GameClientBuilder<C = BincodeCodec> {
    config: SessionConfig,
    codec: C,
    sender_id: Option<String>,
    protocol_version: String,
}

impl Default for GameClientBuilder<BincodeCodec> {
    fn default() -> Self { Self::new() }
}

impl GameClientBuilder<BincodeCodec> {
    /// Builder with default session settings and the `bincode` payload codec.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            codec: BincodeCodec,
            sender_id: None,
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_owned(),
        }
    }
}

impl<C> GameClientBuilder<C>
where
    C: PayloadCodec + Clone,
{
    /// Replace the whole session configuration.
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.server.host = host.into();
        self.config.server.port = port;
        self
    }

    /// Set the ping period and the silence tolerated before reconnecting.
    #[must_use]
    pub fn heartbeat(mut self, interval: Duration, timeout: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self.config.heartbeat_timeout = timeout;
        self
    }

    #[must_use]
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.config.reconnect = policy;
        self
    }

    #[must_use]
    pub fn socket_options(mut self, options: SocketOptions) -> Self {
        self.config.socket = options;
        self
    }

    /// Reject frames longer than `max` bytes in either direction.
    #[must_use]
    pub fn max_frame_length(mut self, max: usize) -> Self {
        self.config.max_frame_length = Some(max);
        self
    }

    /// Identifier placed in every outgoing envelope. Defaults to a random
    /// UUID generated at build time.
    #[must_use]
    pub fn sender_id(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    #[must_use]
    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Use a different payload codec.
    #[must_use]
    pub fn codec<C2>(self, codec: C2) -> GameClientBuilder<C2>
    where
        C2: PayloadCodec + Clone,
    {
        GameClientBuilder {
            config: self.config,
            codec,
            sender_id: self.sender_id,
            protocol_version: self.protocol_version,
        }
    }

    /// Build a disconnected client that connects over plain TCP.
    #[must_use]
    pub fn build(self) -> GameClient<C, TcpConnector> {
        let connector = TcpConnector::new(self.config.socket);
        self.build_with_connector(connector)
    }

    /// Build a disconnected client using a custom [`Connector`].
    #[must_use]
    pub fn build_with_connector<K: Connector>(self, connector: K) -> GameClient<C, K> {
        let (session, inbound) = Session::with_connector(self.config, connector);
        let sender_id = self
            .sender_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        GameClient {
            session,
            inbound,
            router: Router::with_codec(self.codec.clone()),
            hooks: LifecycleHooks::default(),
            codec: self.codec,
            sender_id,
            protocol_version: self.protocol_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_sender_ids_are_unique() {
        let a = GameClientBuilder::new().build();
        let b = GameClientBuilder::new().build();
        assert_ne!(a.sender_id(), b.sender_id());
        assert_eq!(a.sender_id().len(), 36);
    }

    #[test]
    fn settings_reach_the_session() {
        let client = GameClientBuilder::new()
            .server("example.invalid", 4000)
            .heartbeat(Duration::from_millis(500), Duration::from_secs(2))
            .max_frame_length(1024)
            .build();
        let config = client.session().config();
        assert_eq!(config.server.to_string(), "example.invalid:4000");
        assert_eq!(config.heartbeat_interval, Duration::from_millis(500));
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(2));
        assert_eq!(config.max_frame_length, Some(1024));
        assert_eq!(client.protocol_version(), DEFAULT_PROTOCOL_VERSION);
    }
}

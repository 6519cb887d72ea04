//! Establishing TCP connections to the game server.

use std::{io, net::SocketAddr, time::Duration};

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use socket2::{SockRef, TcpKeepalive};
use tokio::net::{TcpSocket, TcpStream, lookup_host};

use super::config::ServerAddr;

/// Source of fresh connections for a session.
///
/// The session calls [`connect`](Connector::connect) once for the initial
/// connection and once per reconnection attempt. Implementations must be
/// cancellation-safe: dropping a pending `connect()` future must not leak
/// resources.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, addr: ServerAddr) -> io::Result<TcpStream>;
}

/// Connects over TCP, applying [`SocketOptions`] before the handshake.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector {
    options: SocketOptions,
}

impl TcpConnector {
    #[must_use]
    pub const fn new(options: SocketOptions) -> Self { Self { options } }

    async fn connect_one(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        self.options.apply(&socket)?;
        socket.connect(addr).await
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, addr: ServerAddr) -> io::Result<TcpStream> {
        let mut last_err = None;
        for resolved in lookup_host((addr.host.as_str(), addr.port)).await? {
            match self.connect_one(resolved).await {
                Ok(stream) => return Ok(stream),
                Err(err) => {
                    debug!("connect to {resolved} failed: {err}");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{addr} did not resolve to any address"),
            )
        }))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum KeepAlive {
    Disabled,
    Idle(Duration),
}

/// Socket options applied before connecting.
///
/// Unset options keep the operating system default.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tickwire::session::SocketOptions;
///
/// let options = SocketOptions::default()
///     .nodelay(true)
///     .keepalive(Some(Duration::from_secs(30)));
/// assert_ne!(options, SocketOptions::default());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketOptions {
    nodelay: Option<bool>,
    keepalive: Option<KeepAlive>,
    send_buffer_size: Option<u32>,
    recv_buffer_size: Option<u32>,
}

impl SocketOptions {
    /// Configure `TCP_NODELAY`. Small position updates should not wait for
    /// Nagle coalescing, so session defaults turn this on.
    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = Some(enabled);
        self
    }

    /// Configure `SO_KEEPALIVE` with the given idle time, or disable it.
    #[must_use]
    pub fn keepalive(mut self, idle: Option<Duration>) -> Self {
        self.keepalive = Some(idle.map_or(KeepAlive::Disabled, KeepAlive::Idle));
        self
    }

    #[must_use]
    pub fn send_buffer_size(mut self, size: u32) -> Self {
        self.send_buffer_size = Some(size);
        self
    }

    #[must_use]
    pub fn recv_buffer_size(mut self, size: u32) -> Self {
        self.recv_buffer_size = Some(size);
        self
    }

    pub(crate) fn apply(&self, socket: &TcpSocket) -> io::Result<()> {
        if let Some(enabled) = self.nodelay {
            socket.set_nodelay(enabled)?;
        }
        match self.keepalive {
            Some(KeepAlive::Idle(idle)) => {
                socket.set_keepalive(true)?;
                SockRef::from(socket).set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))?;
            }
            Some(KeepAlive::Disabled) => socket.set_keepalive(false)?,
            None => {}
        }
        if let Some(size) = self.send_buffer_size {
            socket.set_send_buffer_size(size)?;
        }
        if let Some(size) = self.recv_buffer_size {
            socket.set_recv_buffer_size(size)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn tcp_connector_reaches_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let connector = TcpConnector::new(
            SocketOptions::default()
                .nodelay(true)
                .keepalive(Some(Duration::from_secs(30))),
        );

        let (stream, accepted) = tokio::join!(
            connector.connect(ServerAddr::new("127.0.0.1", port)),
            listener.accept()
        );

        let stream = stream.expect("connect");
        accepted.expect("accept");
        assert!(stream.nodelay().expect("nodelay"));
    }

    #[tokio::test]
    async fn unreachable_port_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let result = TcpConnector::default()
            .connect(ServerAddr::new("127.0.0.1", port))
            .await;
        assert!(result.is_err());
    }
}

//! Session tuning knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::connector::SocketOptions;

/// Host and port of the game server.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerAddr {
    /// Hostname or IP literal, resolved on every connection attempt.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl ServerAddr {
    /// Build an address from its parts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Delay growth between reconnection attempts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backoff {
    /// Wait [`ReconnectPolicy::delay`] before every attempt.
    #[default]
    Fixed,
    /// Double the delay after each failed attempt, capped at `max_delay`.
    Exponential {
        /// Longest wait between attempts.
        max_delay: Duration,
    },
}

/// What the session does after losing an established connection.
///
/// # Default Values
/// - `enabled`: `true`
/// - `max_attempts`: 3
/// - `delay`: 2 seconds
/// - `backoff`: [`Backoff::Fixed`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// When `false`, a lost connection goes straight to `Disconnected`.
    pub enabled: bool,
    /// Connection attempts made per outage before giving up.
    pub max_attempts: u32,
    /// Delay before the first attempt.
    pub delay: Duration,
    /// How the delay grows between attempts.
    pub backoff: Backoff,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            delay: Duration::from_secs(2),
            backoff: Backoff::Fixed,
        }
    }
}

impl ReconnectPolicy {
    /// Policy that never reconnects.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Delay to wait before attempt number `attempt` (starting at 1).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use tickwire::session::{Backoff, ReconnectPolicy};
    ///
    /// let policy = ReconnectPolicy {
    ///     delay: Duration::from_millis(100),
    ///     backoff: Backoff::Exponential {
    ///         max_delay: Duration::from_millis(300),
    ///     },
    ///     ..ReconnectPolicy::default()
    /// };
    /// assert_eq!(policy.delay_for(1), Duration::from_millis(100));
    /// assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    /// assert_eq!(policy.delay_for(3), Duration::from_millis(300));
    /// ```
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { max_delay } => {
                let shift = attempt.saturating_sub(1).min(31);
                self.delay
                    .checked_mul(1_u32 << shift)
                    .unwrap_or(max_delay)
                    .min(max_delay)
            }
        }
    }

    /// Clamp delays to at least one millisecond and keep
    /// `delay <= max_delay`. A policy allowing zero attempts is disabled.
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use tickwire::session::{Backoff, ReconnectPolicy};
    ///
    /// let policy = ReconnectPolicy {
    ///     delay: Duration::from_millis(50),
    ///     backoff: Backoff::Exponential {
    ///         max_delay: Duration::from_millis(10),
    ///     },
    ///     ..ReconnectPolicy::default()
    /// }
    /// .normalized();
    /// assert_eq!(policy.delay, Duration::from_millis(10));
    /// assert_eq!(
    ///     policy.backoff,
    ///     Backoff::Exponential {
    ///         max_delay: Duration::from_millis(50)
    ///     }
    /// );
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.max_attempts == 0 {
            self.enabled = false;
        }
        self.delay = self.delay.max(Duration::from_millis(1));
        if let Backoff::Exponential { max_delay } = &mut self.backoff {
            *max_delay = (*max_delay).max(Duration::from_millis(1));
            if self.delay > *max_delay {
                std::mem::swap(&mut self.delay, max_delay);
            }
        }
        self
    }
}

/// Configuration for a [`Session`](super::Session).
///
/// # Default Values
/// - `server`: `127.0.0.1:3000`
/// - `heartbeat_interval`: 1 second
/// - `heartbeat_timeout`: 5 seconds
/// - `reconnect`: [`ReconnectPolicy::default`]
/// - `max_frame_length`: unlimited
/// - `socket`: `TCP_NODELAY` on
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tickwire::session::SessionConfig;
///
/// let config = SessionConfig {
///     heartbeat_interval: Duration::from_millis(250),
///     ..SessionConfig::new("game.example.net", 7777)
/// };
/// assert_eq!(config.server.to_string(), "game.example.net:7777");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub server: ServerAddr,
    /// Period between outgoing pings.
    pub heartbeat_interval: Duration,
    /// Silence after which the connection is declared dead.
    pub heartbeat_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    /// Largest total frame length accepted in either direction.
    pub max_frame_length: Option<usize>,
    pub socket: SocketOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server: ServerAddr::new("127.0.0.1", 3000),
            heartbeat_interval: Duration::from_secs(1),
            heartbeat_timeout: Duration::from_secs(5),
            reconnect: ReconnectPolicy::default(),
            max_frame_length: None,
            socket: SocketOptions::default().nodelay(true),
        }
    }
}

impl SessionConfig {
    /// Default configuration targeting `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            server: ServerAddr::new(host, port),
            ..Self::default()
        }
    }

    /// Clamp timings to usable values.
    ///
    /// Heartbeat timings are raised to at least one millisecond and the
    /// timeout is kept no shorter than the interval.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.heartbeat_interval = self.heartbeat_interval.max(Duration::from_millis(1));
        self.heartbeat_timeout = self.heartbeat_timeout.max(self.heartbeat_interval);
        self.reconnect = self.reconnect.normalized();
        self
    }
}

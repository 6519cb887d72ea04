//! Liveness and round-trip tracking for the heartbeat loop.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use log::debug;
use tokio::time::Instant;

use crate::{
    frame::{Frame, PacketType},
    messages::Ping,
    payload::{BincodeCodec, PayloadCodec, PayloadError},
};

const NO_SAMPLE: u64 = u64::MAX;

/// Pong bookkeeping shared by the receive and heartbeat loops.
///
/// Times are stored as milliseconds since `origin` so both loops can update
/// them without locking.
#[derive(Debug)]
pub(super) struct Heartbeat {
    origin: Instant,
    last_pong_ms: AtomicU64,
    latency_ms: AtomicU64,
}

impl Heartbeat {
    pub(super) fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_pong_ms: AtomicU64::new(0),
            latency_ms: AtomicU64::new(NO_SAMPLE),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(NO_SAMPLE - 1)
    }

    /// Treat the connection as freshly alive.
    pub(super) fn reset(&self) { self.last_pong_ms.store(self.now_ms(), Ordering::Release); }

    /// Instant after which the connection is considered dead.
    pub(super) fn deadline(&self, timeout: Duration) -> Instant {
        self.origin + Duration::from_millis(self.last_pong_ms.load(Ordering::Acquire)) + timeout
    }

    /// Build the next outgoing ping.
    pub(super) fn ping_frame(&self) -> Result<Frame, PayloadError> {
        let ping = Ping {
            timestamp_ms: self.now_ms(),
        };
        Ok(Frame::new(PacketType::Ping, BincodeCodec.serialize(&ping)?))
    }

    /// Record a ping echoed by the server.
    ///
    /// Any ping from the server proves the link is alive; a round-trip sample
    /// is taken only when the payload carries one of our timestamps.
    pub(super) fn observe_pong(&self, payload: &[u8]) {
        let now = self.now_ms();
        self.last_pong_ms.store(now, Ordering::Release);
        match BincodeCodec.deserialize::<Ping>(payload) {
            Ok(Ping { timestamp_ms }) if timestamp_ms <= now => {
                let rtt = now - timestamp_ms;
                self.latency_ms.store(rtt, Ordering::Release);
                crate::metrics::record_heartbeat_rtt(Duration::from_millis(rtt));
            }
            Ok(_) => debug!("ignoring pong stamped in the future"),
            Err(err) => debug!("pong without a usable timestamp: {err}"),
        }
    }

    /// Most recent round-trip time, if any pong carried a timestamp.
    pub(super) fn latency(&self) -> Option<Duration> {
        match self.latency_ms.load(Ordering::Acquire) {
            NO_SAMPLE => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn echoed_ping_yields_round_trip() {
        let heartbeat = Heartbeat::new();
        let ping = heartbeat.ping_frame().expect("ping");
        tokio::time::advance(Duration::from_millis(40)).await;

        heartbeat.observe_pong(ping.payload());

        assert_eq!(heartbeat.latency(), Some(Duration::from_millis(40)));
    }

    #[tokio::test(start_paused = true)]
    async fn any_pong_extends_deadline() {
        let heartbeat = Heartbeat::new();
        heartbeat.reset();
        let timeout = Duration::from_secs(5);
        let first = heartbeat.deadline(timeout);
        tokio::time::advance(Duration::from_secs(3)).await;

        heartbeat.observe_pong(&[]);

        assert_eq!(heartbeat.deadline(timeout), first + Duration::from_secs(3));
        assert_eq!(heartbeat.latency(), None);
    }
}

//! Metric helpers for `tickwire`.
//!
//! Thin wrappers over the [`metrics`](https://docs.rs/metrics) facade. With the
//! `metrics` feature disabled every helper compiles to nothing, so call sites
//! need no feature gates of their own.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge, histogram};

/// Gauge of currently open server connections.
pub const CONNECTIONS_ACTIVE: &str = "tickwire_connections_active";
/// Counter of frames sent or received, labelled by `direction`.
pub const FRAMES_PROCESSED: &str = "tickwire_frames_processed_total";
/// Counter of inbound frames discarded because their payload did not decode.
pub const FRAMES_DROPPED: &str = "tickwire_frames_dropped_total";
/// Counter of callbacks that returned an error or panicked.
pub const HANDLER_ERRORS: &str = "tickwire_handler_errors_total";
/// Counter of reconnection attempts.
pub const RECONNECT_ATTEMPTS: &str = "tickwire_reconnect_attempts_total";
/// Counter of heartbeat timeouts.
pub const HEARTBEAT_TIMEOUTS: &str = "tickwire_heartbeat_timeouts_total";
/// Histogram of heartbeat round-trip times in seconds.
pub const HEARTBEAT_RTT: &str = "tickwire_heartbeat_rtt_seconds";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Frames read from the server.
    Inbound,
    /// Frames written to the server.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a processed frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a frame dropped for an undecodable payload.
pub fn inc_dropped_frames() {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_DROPPED).increment(1);
}

/// Record a failed or panicking callback.
pub fn inc_handler_errors() {
    #[cfg(feature = "metrics")]
    counter!(HANDLER_ERRORS).increment(1);
}

/// Record one reconnection attempt.
pub fn inc_reconnect_attempts() {
    #[cfg(feature = "metrics")]
    counter!(RECONNECT_ATTEMPTS).increment(1);
}

/// Record a heartbeat timeout.
pub fn inc_heartbeat_timeouts() {
    #[cfg(feature = "metrics")]
    counter!(HEARTBEAT_TIMEOUTS).increment(1);
}

/// Record a heartbeat round trip.
pub fn record_heartbeat_rtt(rtt: std::time::Duration) {
    #[cfg(feature = "metrics")]
    histogram!(HEARTBEAT_RTT).record(rtt.as_secs_f64());
    #[cfg(not(feature = "metrics"))]
    let _ = rtt;
}

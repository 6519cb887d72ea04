//! Shared utilities for integration tests.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::time::Duration;

use tickwire::{
    BincodeCodec,
    GameClient,
    GameClientBuilder,
    session::{Connector, ReconnectPolicy},
};
use tokio::time::{Instant, sleep};

pub use tickwire_testing::TestResult;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// Builder targeting `port` with timings short enough for tests.
pub fn fast_client(port: u16) -> GameClientBuilder {
    GameClient::builder()
        .server("127.0.0.1", port)
        .sender_id("test-device")
        .heartbeat(Duration::from_millis(50), Duration::from_millis(250))
        .reconnect(ReconnectPolicy {
            delay: Duration::from_millis(20),
            ..ReconnectPolicy::default()
        })
}

/// Tick `client` until `done` returns true.
///
/// # Errors
///
/// Returns an error if `done` is still false after [`WAIT`].
pub async fn tick_until<K, F>(client: &mut GameClient<BincodeCodec, K>, mut done: F) -> TestResult
where
    K: Connector,
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + WAIT;
    loop {
        client.tick();
        if done() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err("condition not reached before deadline".into());
        }
        sleep(Duration::from_millis(5)).await;
    }
}

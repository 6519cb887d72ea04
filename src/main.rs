//! Demo client for `tickwire`.
//!
//! Connects to a game server, sends the handshake, walks the local player in
//! a circle and logs every position broadcast.

mod cli;

use std::time::Duration;

use clap::Parser;
use tickwire::{
    ClientError,
    GameClient,
    messages::{InitialPayload, LocationUpdate},
    session::{ReconnectPolicy, SessionState},
};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = cli::Cli::parse();
    let mut builder = GameClient::builder()
        .server(cli.host.as_str(), cli.port)
        .reconnect(ReconnectPolicy {
            max_attempts: cli.reconnect_attempts,
            ..ReconnectPolicy::default()
        });
    if let Some(device_id) = &cli.device_id {
        builder = builder.sender_id(device_id.as_str());
    }
    let mut client = builder.build();

    client.on_connected(|| info!("connected"));
    client.on_reconnecting(|attempt, max| info!(attempt, max, "connection lost, reconnecting"));
    client.on_disconnected(|reason| warn!(%reason, "disconnected"));
    client.on_location(|update: LocationUpdate| {
        for user in &update.users {
            info!(id = %user.id, x = user.x, y = user.y, "user position");
        }
        Ok(())
    });

    client.connect().await?;
    client
        .send_initial(&InitialPayload {
            device_id: client.sender_id().to_owned(),
            player_id: cli.player_id,
            latency: 0.0,
        })
        .await?;

    let started = Instant::now();
    let deadline = cli.duration_secs.map(|secs| started + Duration::from_secs(secs));
    let mut ticker = interval(Duration::from_millis(cli.tick_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        client.tick();
        match client.state() {
            SessionState::Connected => {
                let angle = started.elapsed().as_secs_f32();
                if let Err(err) = client.send_location(angle.cos(), angle.sin()).await {
                    warn!(%err, "failed to send location");
                }
            }
            SessionState::Disconnected | SessionState::Closed => break,
            SessionState::Connecting | SessionState::Reconnecting => {}
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
    }

    client.tick();
    if let Some(latency) = client.latency() {
        info!(?latency, "last heartbeat round trip");
    }
    client.close().await;
    Ok(())
}

//! Command line interface for the `tickwire` demo client.
//!
//! Kept free of crate dependencies so the build script can render a man page
//! from it.

use clap::Parser;

/// Command line arguments for the `tickwire` binary.
#[derive(Debug, Parser)]
#[command(
    name = "tickwire",
    version,
    about = "Connects to a game server, reports a moving position and prints updates"
)]
pub struct Cli {
    /// Game server host.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Game server port.
    #[arg(short, long, default_value_t = 3000)]
    pub port: u16,

    /// Device identifier sent in the handshake. Random when omitted.
    #[arg(long)]
    pub device_id: Option<String>,

    /// Player number sent in the handshake.
    #[arg(long, default_value_t = 0)]
    pub player_id: u32,

    /// Application tick period in milliseconds.
    #[arg(long, default_value_t = 50)]
    pub tick_ms: u64,

    /// Stop after this many seconds; run until interrupted when omitted.
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// Maximum reconnection attempts after losing the connection.
    #[arg(long, default_value_t = 3)]
    pub reconnect_attempts: u32,
}

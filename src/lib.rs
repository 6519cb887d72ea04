#![doc(html_root_url = "https://docs.rs/tickwire/latest")]
//! Public API for the `tickwire` library.
//!
//! This crate implements the network session of a real-time multiplayer game
//! client: length-prefixed framing over TCP, stream reassembly, a hand-off
//! queue between socket I/O and the application's tick, callback routing,
//! and a connection state machine with heartbeats and automatic
//! reconnection.
//!
//! Most applications only need [`GameClient`]:
//!
//! ```no_run
//! use tickwire::GameClient;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), tickwire::ClientError> {
//! let mut client = GameClient::builder().server("127.0.0.1", 3000).build();
//! client.on_connected(|| println!("connected"));
//! client.connect().await?;
//! client.tick();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod codec;
pub mod envelope;
pub mod frame;
pub mod messages;
pub mod metrics;
pub mod panic;
pub mod payload;
pub mod queue;
pub mod router;
pub mod session;

pub use client::{ClientError, GameClient, GameClientBuilder};
pub use codec::{CodecError, FrameCodec, FramingError, Reassembler};
pub use envelope::{Envelope, Response};
pub use frame::{Frame, PacketType};
pub use metrics::Direction;
pub use payload::{BincodeCodec, Message, PayloadCodec, PayloadError};
pub use router::{DispatchOutcome, HandlerResult, Router};
pub use session::{
    DisconnectReason,
    Session,
    SessionConfig,
    SessionError,
    SessionEvent,
    SessionState,
};

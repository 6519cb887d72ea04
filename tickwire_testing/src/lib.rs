//! Test utilities for `tickwire`.
//!
//! Provides a scriptable in-process game server ([`TestServer`]) and a
//! serialised log capture fixture ([`logger`]).
//!
//! ```rust,no_run
//! use tickwire_testing::{ServerMode, TestServer};
//!
//! # async fn example() -> std::io::Result<()> {
//! let server = TestServer::start(ServerMode::Echo).await?;
//! let port = server.port();
//! # let _ = port;
//! # Ok(())
//! # }
//! ```

pub mod logging;
pub mod server;

pub use logging::{LoggerHandle, logger};
pub use server::{ServerMode, TestServer};

/// Result type for fallible tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

//! relay-rs: real-time text broadcast relay
//!
//! Clients connect over TCP and exchange length-prefixed frames. Every frame
//! one client sends is relayed verbatim to every other connected client and
//! never echoed back to its sender.
//!
//! - [`protocol`] defines the frame format and the buffered frame reader.
//! - [`registry`] holds the set of live connections and the broadcaster that
//!   fans messages out to them.
//! - [`server`] accepts connections and runs one task per client.
//! - [`session`] tracks each connection's lifecycle phase.
//! - [`client`] is a minimal framed client.
//!
//! # Example
//! ```no_run
//! use relay_rs::{RelayServer, ServerConfig};
//!
//! # async fn example() -> relay_rs::error::Result<()> {
//! let config = ServerConfig::with_addr("127.0.0.1:12345".parse().unwrap());
//! let server = RelayServer::bind(config).await?;
//! server.run_until_ctrl_c().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use client::RelayClient;
pub use error::{Error, FramingError, Result};
pub use server::{RelayServer, ServerConfig};

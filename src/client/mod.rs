//! Relay client implementation
//!
//! A thin framed connection to a relay server, used by the `relay connect`
//! command and by the integration tests.

pub mod connector;
pub mod terminal;

pub use connector::{ClientReader, ClientWriter, RelayClient};

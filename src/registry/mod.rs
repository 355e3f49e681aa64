//! Connection registry and broadcast fan-out
//!
//! The registry is the only shared mutable state in the relay. Each
//! connection registers a [`PeerHandle`]; a [`Broadcaster`] snapshots the
//! registry and queues the payload on every other peer's private outbound
//! queue.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<ConnectionRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ RwLock<HashMap<ConnectionId, │
//!                 │   Arc<PeerHandle> {          │
//!                 │     tx: mpsc::Sender<Bytes>, │
//!                 │     alive, closed,           │
//!                 │   }                          │
//!                 │ >>                           │
//!                 └──────────────┬───────────────┘
//!                                │ snapshot()
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!   [Connection A]          [Connection B]          [Connection C]
//!   read_frame()            writer: rx.recv()       writer: rx.recv()
//!        │                       │                       │
//!        └──► deliver() ──► peer.send() ──► write_frame() ──► TCP
//! ```
//!
//! # Zero-Copy Design
//!
//! Payloads are `bytes::Bytes`; every recipient queue holds a
//! reference-counted view of the same allocation.

pub mod broadcast;
pub mod error;
pub mod message;
pub mod peer;
pub mod store;

pub use broadcast::{Broadcaster, DeliveryReport};
pub use error::RegistryError;
pub use message::Message;
pub use peer::{ConnectionId, PeerHandle, SendOutcome};
pub use store::ConnectionRegistry;

//! Connection lifecycle state machine
//!
//! ```text
//! Spawned ──► Registered ──► Active ──► Closing ──► Removed
//!    │            │                        ▲
//!    └────────────┴────────────────────────┘
//! ```
//!
//! Transitions only move forward. A connection can skip straight to
//! `Closing` if registration fails or it is closed before its receive loop
//! starts.

use std::net::SocketAddr;

use crate::registry::ConnectionId;

/// Lifecycle phase of one accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionPhase {
    /// Task spawned for an accepted socket
    Spawned,
    /// Present in the registry
    Registered,
    /// Receive loop running
    Active,
    /// Receive loop finished, tearing down
    Closing,
    /// Deregistered and transport released
    Removed,
}

/// Why a connection left the `Active` phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer closed the stream on a frame boundary
    EndOfStream,
    /// Peer violated the framing contract
    FramingError,
    /// Read or write on the socket failed
    TransportError,
    /// Connection was closed from outside (overflow, write failure, shutdown)
    Closed,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CloseReason::EndOfStream => "end of stream",
            CloseReason::FramingError => "framing error",
            CloseReason::TransportError => "transport error",
            CloseReason::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Lifecycle bookkeeping for one connection
#[derive(Debug)]
pub struct ConnectionState {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    phase: ConnectionPhase,
    pub close_reason: Option<CloseReason>,
}

impl ConnectionState {
    pub fn new(id: ConnectionId, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            phase: ConnectionPhase::Spawned,
            close_reason: None,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Move to `next` if it is ahead of the current phase
    ///
    /// Returns `false` (and leaves the phase unchanged) for backward or
    /// repeated transitions.
    pub fn advance(&mut self, next: ConnectionPhase) -> bool {
        if next <= self.phase {
            return false;
        }

        tracing::trace!(
            connection_id = %self.id,
            from = ?self.phase,
            to = ?next,
            "Connection phase change"
        );
        self.phase = next;
        true
    }

    pub fn registered(&mut self) -> bool {
        self.advance(ConnectionPhase::Registered)
    }

    pub fn activate(&mut self) -> bool {
        self.advance(ConnectionPhase::Active)
    }

    /// Enter `Closing`, remembering the first reason given
    pub fn start_closing(&mut self, reason: CloseReason) -> bool {
        if self.close_reason.is_none() {
            self.close_reason = Some(reason);
        }
        self.advance(ConnectionPhase::Closing)
    }

    pub fn removed(&mut self) -> bool {
        self.advance(ConnectionPhase::Removed)
    }

    pub fn is_active(&self) -> bool {
        self.phase == ConnectionPhase::Active
    }

    pub fn is_removed(&self) -> bool {
        self.phase == ConnectionPhase::Removed
    }
}

//! Per-connection handle shared with the registry
//!
//! A `PeerHandle` is the broadcast-facing side of one connection. It owns the
//! sending half of the connection's outbound queue and its liveness flag; the
//! connection task owns the socket and the receiving half of the queue.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};

use crate::stats::ConnectionStats;

/// Unique identifier of an accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of queueing one payload for a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Payload is in the outbound queue
    Queued,
    /// Peer is already closed; payload discarded
    Dropped,
    /// Queue was full; payload discarded and the peer disconnected
    Overflow,
}

/// Broadcast-facing handle for one live connection
#[derive(Debug)]
pub struct PeerHandle {
    id: ConnectionId,
    peer_addr: SocketAddr,
    tx: mpsc::Sender<Bytes>,
    alive: AtomicBool,
    closed_tx: watch::Sender<bool>,
    stats: ConnectionStats,
}

impl PeerHandle {
    /// Create a handle with an outbound queue of `queue_capacity` frames
    ///
    /// Returns the receiving end of the queue, to be drained by the
    /// connection's writer.
    pub fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        queue_capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let (closed_tx, _) = watch::channel(false);

        let handle = Arc::new(Self {
            id,
            peer_addr,
            tx,
            alive: AtomicBool::new(true),
            closed_tx,
            stats: ConnectionStats::new(),
        });

        (handle, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Queue `payload` for delivery without waiting
    ///
    /// Never blocks the caller. A full queue means the peer is not keeping up;
    /// it is disconnected rather than allowed to stall the broadcaster.
    pub fn send(&self, payload: Bytes) -> SendOutcome {
        if !self.is_alive() {
            self.stats.record_dropped();
            return SendOutcome::Dropped;
        }

        match self.tx.try_send(payload) {
            Ok(()) => SendOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    connection_id = %self.id,
                    peer = %self.peer_addr,
                    capacity = self.tx.max_capacity(),
                    "Outbound queue full, disconnecting slow peer"
                );
                self.stats.record_dropped();
                self.close();
                SendOutcome::Overflow
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // Writer already gone
                self.stats.record_dropped();
                self.close();
                SendOutcome::Dropped
            }
        }
    }

    /// Mark the connection dead and wake its reader and writer
    ///
    /// Idempotent. Returns `true` only for the call that performed the close.
    pub fn close(&self) -> bool {
        if self.alive.swap(false, Ordering::AcqRel) {
            self.closed_tx.send_replace(true);
            tracing::debug!(connection_id = %self.id, "Connection marked closed");
            true
        } else {
            false
        }
    }

    /// Resolve once [`close`](Self::close) has been called
    ///
    /// Returns immediately if the handle is already closed.
    pub async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_send_queues_in_order() {
        let (peer, mut rx) = PeerHandle::new(ConnectionId(1), addr(), 8);

        assert_eq!(peer.send(Bytes::from_static(b"one")), SendOutcome::Queued);
        assert_eq!(peer.send(Bytes::from_static(b"two")), SendOutcome::Queued);

        assert_eq!(&rx.recv().await.unwrap()[..], b"one");
        assert_eq!(&rx.recv().await.unwrap()[..], b"two");
    }

    #[tokio::test]
    async fn test_send_after_close_is_dropped() {
        let (peer, mut rx) = PeerHandle::new(ConnectionId(1), addr(), 8);

        assert!(peer.close());
        assert_eq!(peer.send(Bytes::from_static(b"late")), SendOutcome::Dropped);
        assert!(rx.try_recv().is_err());
        assert_eq!(peer.stats().snapshot().frames_dropped, 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (peer, _rx) = PeerHandle::new(ConnectionId(1), addr(), 8);

        assert!(peer.close());
        assert!(!peer.close());
        assert!(!peer.is_alive());
    }

    #[tokio::test]
    async fn test_overflow_disconnects() {
        let (peer, _rx) = PeerHandle::new(ConnectionId(1), addr(), 1);

        assert_eq!(peer.send(Bytes::from_static(b"a")), SendOutcome::Queued);
        assert_eq!(peer.send(Bytes::from_static(b"b")), SendOutcome::Overflow);
        assert!(!peer.is_alive());
        assert_eq!(peer.send(Bytes::from_static(b"c")), SendOutcome::Dropped);
    }

    #[tokio::test]
    async fn test_send_with_writer_gone() {
        let (peer, rx) = PeerHandle::new(ConnectionId(1), addr(), 4);
        drop(rx);

        assert_eq!(peer.send(Bytes::from_static(b"a")), SendOutcome::Dropped);
        assert!(!peer.is_alive());
    }

    #[tokio::test]
    async fn test_closed_wakes_waiter() {
        let (peer, _rx) = PeerHandle::new(ConnectionId(1), addr(), 4);

        let waiter = {
            let peer = Arc::clone(&peer);
            tokio::spawn(async move { peer.closed().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        peer.close();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_closed_resolves_when_already_closed() {
        let (peer, _rx) = PeerHandle::new(ConnectionId(1), addr(), 4);
        peer.close();

        tokio::time::timeout(Duration::from_millis(100), peer.closed())
            .await
            .expect("already closed handle resolves immediately");
    }
}

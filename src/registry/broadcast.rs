//! Broadcast fan-out
//!
//! One delivery pass works on a registry snapshot: the registry lock is held
//! only to copy the membership, then each peer gets the payload through its
//! own non-blocking queue. A failing peer affects nobody else and is never
//! reported back to the sender.

use std::sync::Arc;

use super::message::Message;
use super::peer::SendOutcome;
use super::store::ConnectionRegistry;

/// Per-pass delivery counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Peers the payload was queued for
    pub queued: usize,
    /// Peers that were already closed
    pub dropped: usize,
    /// Peers disconnected because their queue was full
    pub overflowed: usize,
}

impl DeliveryReport {
    /// Number of peers a delivery was attempted to
    pub fn attempted(&self) -> usize {
        self.queued + self.dropped + self.overflowed
    }

    fn record(&mut self, outcome: SendOutcome) {
        match outcome {
            SendOutcome::Queued => self.queued += 1,
            SendOutcome::Dropped => self.dropped += 1,
            SendOutcome::Overflow => self.overflowed += 1,
        }
    }
}

/// Delivers messages to every registered connection except the origin
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Fan `message` out to all peers but its origin
    pub async fn deliver(&self, message: &Message) -> DeliveryReport {
        let peers = self.registry.snapshot().await;
        let mut report = DeliveryReport::default();

        for peer in peers.iter().filter(|peer| peer.id() != message.origin) {
            let outcome = peer.send(message.payload.clone());
            if outcome != SendOutcome::Queued {
                tracing::debug!(
                    origin = %message.origin,
                    connection_id = %peer.id(),
                    ?outcome,
                    "Delivery skipped"
                );
            }
            report.record(outcome);
        }

        tracing::trace!(
            origin = %message.origin,
            bytes = message.len(),
            queued = report.queued,
            text = %message.text(),
            "Message delivered"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use bytes::Bytes;
    use tokio::sync::mpsc;

    use super::*;
    use crate::registry::peer::{ConnectionId, PeerHandle};

    async fn register(
        registry: &ConnectionRegistry,
        id: u64,
        capacity: usize,
    ) -> (Arc<PeerHandle>, mpsc::Receiver<Bytes>) {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let (handle, rx) = PeerHandle::new(ConnectionId(id), addr, capacity);
        registry.add(Arc::clone(&handle)).await.unwrap();
        (handle, rx)
    }

    fn message(origin: u64, text: &'static str) -> Message {
        Message::new(ConnectionId(origin), Bytes::from_static(text.as_bytes()))
    }

    #[tokio::test]
    async fn test_delivers_to_all_but_origin() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (_a, mut rx_a) = register(&registry, 1, 8).await;
        let (_b, mut rx_b) = register(&registry, 2, 8).await;
        let (_c, mut rx_c) = register(&registry, 3, 8).await;

        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let report = broadcaster.deliver(&message(1, "hello")).await;

        assert_eq!(report.queued, 2);
        assert_eq!(&rx_b.recv().await.unwrap()[..], b"hello");
        assert_eq!(&rx_c.recv().await.unwrap()[..], b"hello");
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_per_peer_order_preserved() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (_a, _rx_a) = register(&registry, 1, 8).await;
        let (_b, mut rx_b) = register(&registry, 2, 8).await;

        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        broadcaster.deliver(&message(1, "m1")).await;
        broadcaster.deliver(&message(1, "m2")).await;

        assert_eq!(&rx_b.recv().await.unwrap()[..], b"m1");
        assert_eq!(&rx_b.recv().await.unwrap()[..], b"m2");
    }

    #[tokio::test]
    async fn test_closed_peer_does_not_block_others() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (_a, _rx_a) = register(&registry, 1, 8).await;
        let (b, _rx_b) = register(&registry, 2, 8).await;
        let (_c, mut rx_c) = register(&registry, 3, 8).await;

        // Closed but not yet deregistered
        b.close();

        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let report = broadcaster.deliver(&message(1, "still here")).await;

        assert_eq!(report.queued, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(&rx_c.recv().await.unwrap()[..], b"still here");
    }

    #[tokio::test]
    async fn test_slow_peer_overflow_isolated() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (_a, _rx_a) = register(&registry, 1, 8).await;
        let (slow, _rx_slow) = register(&registry, 2, 1).await;
        let (_c, mut rx_c) = register(&registry, 3, 8).await;

        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        broadcaster.deliver(&message(1, "one")).await;
        let report = broadcaster.deliver(&message(1, "two")).await;

        assert_eq!(report.overflowed, 1);
        assert!(!slow.is_alive());
        assert_eq!(&rx_c.recv().await.unwrap()[..], b"one");
        assert_eq!(&rx_c.recv().await.unwrap()[..], b"two");
    }

    #[tokio::test]
    async fn test_removed_peer_receives_nothing() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (_a, _rx_a) = register(&registry, 1, 8).await;
        let (_b, mut rx_b) = register(&registry, 2, 8).await;

        registry.remove(ConnectionId(2)).await;

        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let report = broadcaster.deliver(&message(1, "gone")).await;

        assert_eq!(report.attempted(), 0);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_lone_sender_reaches_nobody() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (_a, mut rx_a) = register(&registry, 1, 8).await;

        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let report = broadcaster.deliver(&message(1, "anyone?")).await;

        assert_eq!(report, DeliveryReport::default());
        assert!(rx_a.try_recv().is_err());
    }
}

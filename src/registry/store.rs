//! Connection registry implementation
//!
//! The authoritative set of live connections. Every mutation and every
//! snapshot goes through one `RwLock`; sends to individual peers never happen
//! while it is held.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::error::RegistryError;
use super::peer::{ConnectionId, PeerHandle};

/// Central registry of connections eligible to receive broadcasts
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

struct RegistryInner {
    peers: HashMap<ConnectionId, Arc<PeerHandle>>,
    shut_down: bool,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                peers: HashMap::new(),
                shut_down: false,
            }),
        }
    }

    /// Register a connection
    ///
    /// Identities are unique per accept, so no duplicate check is made.
    /// Fails only once [`close_all`](Self::close_all) has run.
    pub async fn add(&self, peer: Arc<PeerHandle>) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().await;

        if inner.shut_down {
            return Err(RegistryError::ShuttingDown);
        }

        let id = peer.id();
        inner.peers.insert(id, peer);

        tracing::debug!(
            connection_id = %id,
            connections = inner.peers.len(),
            "Connection registered"
        );

        Ok(())
    }

    /// Deregister a connection and close its handle
    ///
    /// The handle is closed while the write lock is held, so once a caller has
    /// observed the removal no further payload can be queued for it. Removing
    /// an unknown or already removed id is a no-op.
    pub async fn remove(&self, id: ConnectionId) -> Option<Arc<PeerHandle>> {
        let mut inner = self.inner.write().await;

        let peer = inner.peers.remove(&id)?;
        peer.close();

        tracing::debug!(
            connection_id = %id,
            connections = inner.peers.len(),
            "Connection deregistered"
        );

        Some(peer)
    }

    /// Copy of the current membership for one broadcast pass
    pub async fn snapshot(&self) -> Vec<Arc<PeerHandle>> {
        self.inner.read().await.peers.values().cloned().collect()
    }

    /// Close every connection and refuse further registrations
    ///
    /// Returns the number of connections that were closed.
    pub async fn close_all(&self) -> usize {
        let mut inner = self.inner.write().await;
        inner.shut_down = true;

        let count = inner.peers.len();
        for (_, peer) in inner.peers.drain() {
            peer.close();
        }

        tracing::info!(connections = count, "Registry closed");
        count
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.peers.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.peers.is_empty()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.inner.read().await.peers.contains_key(&id)
    }

    /// Ids of all registered connections, in ascending order
    pub async fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.inner.read().await.peers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn is_shut_down(&self) -> bool {
        self.inner.read().await.shut_down
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

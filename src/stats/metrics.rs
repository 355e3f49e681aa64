//! Statistics for relay connections and the server as a whole
//!
//! Counters are plain atomics so the receive loop, the writer task and
//! broadcasters on other connections can all update them without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live per-connection counters
#[derive(Debug)]
pub struct ConnectionStats {
    connected_at: Instant,
    frames_received: AtomicU64,
    bytes_received: AtomicU64,
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    frames_dropped: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self {
            connected_at: Instant::now(),
            frames_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
        }
    }

    /// Record a frame read from the peer
    pub fn record_received(&self, payload_len: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(payload_len as u64, Ordering::Relaxed);
    }

    /// Record a frame written to the peer
    pub fn record_sent(&self, payload_len: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(payload_len as u64, Ordering::Relaxed);
    }

    /// Record a frame that was never queued (closed or overflowing connection)
    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough copy of the counters
    pub fn snapshot(&self) -> ConnectionStatsSnapshot {
        ConnectionStatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            duration: self.connected_at.elapsed(),
        }
    }
}

impl Default for ConnectionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ConnectionStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatsSnapshot {
    pub frames_received: u64,
    pub bytes_received: u64,
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub frames_dropped: u64,
    /// Time since the connection was accepted
    pub duration: Duration,
}

/// Server-wide connection counters
#[derive(Debug, Default)]
pub struct ServerStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
    closed: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_closed(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServerStatsSnapshot {
        let accepted = self.accepted.load(Ordering::Relaxed);
        let closed = self.closed.load(Ordering::Relaxed);
        ServerStatsSnapshot {
            accepted,
            rejected: self.rejected.load(Ordering::Relaxed),
            closed,
            active: accepted.saturating_sub(closed),
        }
    }
}

/// Point-in-time copy of [`ServerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStatsSnapshot {
    /// Connections accepted and handed to a connection task
    pub accepted: u64,
    /// Connections turned away at the connection limit
    pub rejected: u64,
    /// Accepted connections whose task has finished
    pub closed: u64,
    /// Accepted connections still running
    pub active: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_stats_counts() {
        let stats = ConnectionStats::new();
        stats.record_received(5);
        stats.record_received(3);
        stats.record_sent(10);
        stats.record_dropped();

        let snap = stats.snapshot();
        assert_eq!(snap.frames_received, 2);
        assert_eq!(snap.bytes_received, 8);
        assert_eq!(snap.frames_sent, 1);
        assert_eq!(snap.bytes_sent, 10);
        assert_eq!(snap.frames_dropped, 1);
    }

    #[test]
    fn test_server_stats_active() {
        let stats = ServerStats::new();
        stats.record_accepted();
        stats.record_accepted();
        stats.record_accepted();
        stats.record_rejected();
        stats.record_closed();

        let snap = stats.snapshot();
        assert_eq!(snap.accepted, 3);
        assert_eq!(snap.rejected, 1);
        assert_eq!(snap.closed, 1);
        assert_eq!(snap.active, 2);
    }
}

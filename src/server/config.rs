//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::protocol::constants::*;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Largest frame payload accepted from a client, in bytes
    pub max_frame_size: usize,

    /// Frames that may wait in one connection's outbound queue before that
    /// connection is considered too slow and dropped
    pub outbound_queue_capacity: usize,

    /// Upper bound for writing a single frame to a peer; never longer than
    /// `shutdown_timeout` in effect
    pub write_timeout: Duration,

    /// How long shutdown waits for connection tasks to finish
    pub shutdown_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Application-level read buffer size
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            write_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(5),
            tcp_nodelay: true, // Chat lines are small and latency-sensitive
            read_buffer_size: 8 * 1024,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set maximum frame payload size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size.min(u32::MAX as usize);
        self
    }

    /// Set per-connection outbound queue capacity (at least 1)
    pub fn outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.outbound_queue_capacity = capacity.max(1);
        self
    }

    /// Set per-frame write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set shutdown drain timeout
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Write timeout actually applied to connections
    ///
    /// A stalled write must not hold a connection open past the shutdown
    /// drain, so it is clamped to `shutdown_timeout`.
    pub fn effective_write_timeout(&self) -> Duration {
        self.write_timeout.min(self.shutdown_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert!(config.bind_addr.ip().is_loopback());
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.max_frame_size, 64 * 1024);
        assert_eq!(config.outbound_queue_capacity, DEFAULT_OUTBOUND_QUEUE_CAPACITY);
        assert!(config.tcp_nodelay);
        assert!(config.write_timeout <= config.shutdown_timeout);
    }

    #[test]
    fn test_write_timeout_clamped_to_shutdown() {
        let config = ServerConfig::default()
            .write_timeout(Duration::from_secs(30))
            .shutdown_timeout(Duration::from_millis(200));

        assert_eq!(config.effective_write_timeout(), Duration::from_millis(200));

        let config = config.write_timeout(Duration::from_millis(50));
        assert_eq!(config.effective_write_timeout(), Duration::from_millis(50));
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:1936".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 1936);
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
    }

    #[test]
    fn test_builder_max_frame_size_capped() {
        let config = ServerConfig::default().max_frame_size(usize::MAX);

        assert_eq!(config.max_frame_size, u32::MAX as usize);
    }

    #[test]
    fn test_builder_queue_capacity_at_least_one() {
        let config = ServerConfig::default().outbound_queue_capacity(0);

        assert_eq!(config.outbound_queue_capacity, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "0.0.0.0:8080".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .max_frame_size(1024)
            .outbound_queue_capacity(16)
            .write_timeout(Duration::from_secs(2))
            .shutdown_timeout(Duration::from_secs(1));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.max_frame_size, 1024);
        assert_eq!(config.outbound_queue_capacity, 16);
        assert_eq!(config.write_timeout, Duration::from_secs(2));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }
}

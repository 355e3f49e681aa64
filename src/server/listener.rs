//! Relay server listener
//!
//! Handles the TCP accept loop, spawns one task per connection, and tears
//! everything down on shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{Error, Result};
use crate::registry::{Broadcaster, ConnectionId, ConnectionRegistry};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::stats::ServerStats;

/// Broadcast relay server
pub struct RelayServer {
    config: ServerConfig,
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Broadcaster,
    stats: Arc<ServerStats>,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl RelayServer {
    /// Bind the listening socket
    ///
    /// Failing to bind is the one error that is fatal to the server.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| Error::Bind {
                addr: config.bind_addr,
                source,
            })?;

        if config.write_timeout > config.shutdown_timeout {
            tracing::warn!(
                write_timeout = ?config.write_timeout,
                shutdown_timeout = ?config.shutdown_timeout,
                "Write timeout exceeds shutdown timeout, clamping"
            );
        }

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let registry = Arc::new(ConnectionRegistry::new());

        Ok(Self {
            broadcaster: Broadcaster::new(Arc::clone(&registry)),
            registry,
            config,
            listener,
            stats: Arc::new(ServerStats::new()),
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
        })
    }

    /// Address the listener is actually bound to (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Get a reference to the connection registry
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server until the process is killed
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until Ctrl-C
    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to install Ctrl-C handler");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run the server with graceful shutdown
    ///
    /// When `shutdown` resolves the listener is closed, every connection is
    /// closed, and connection tasks get `shutdown_timeout` to finish.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = %self.local_addr()?, "Relay server listening");

        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => self.handle_connection(&mut tasks, socket, peer_addr),
                    Err(e) => tracing::error!(error = %e, "Failed to accept connection"),
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Connection task panicked");
                    }
                }
            }
        }

        let RelayServer {
            config,
            listener,
            registry,
            ..
        } = self;

        // Stop accepting before closing what is already connected
        drop(listener);
        let closed = registry.close_all().await;

        let drained = tokio::time::timeout(config.shutdown_timeout, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Connection task panicked");
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = tasks.len(),
                "Connections did not finish before shutdown timeout, aborting"
            );
            tasks.shutdown().await;
        }

        tracing::info!(connections = closed, "Relay server stopped");
        Ok(())
    }

    fn handle_connection(&self, tasks: &mut JoinSet<()>, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = match self.connection_semaphore {
            Some(ref sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    self.stats.record_rejected();
                    return;
                }
            },
            None => None,
        };

        let id = ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed));

        tracing::debug!(connection_id = %id, peer = %peer_addr, "New connection");

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(connection_id = %id, error = %e, "Failed to configure socket");
            return;
        }

        self.stats.record_accepted();

        let connection = Connection::new(
            id,
            socket,
            peer_addr,
            self.config.clone(),
            self.broadcaster.clone(),
        );
        let stats = Arc::clone(&self.stats);

        tasks.spawn(async move {
            let _permit = permit;

            if let Err(e) = connection.run().await {
                if e.is_shutdown() {
                    tracing::debug!(connection_id = %id, "Connection refused during shutdown");
                } else if e.is_disconnect() {
                    tracing::debug!(connection_id = %id, error = %e, "Connection dropped");
                } else {
                    tracing::warn!(connection_id = %id, error = %e, "Connection error");
                }
            }

            stats.record_closed();
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}

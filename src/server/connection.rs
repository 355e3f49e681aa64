//! Per-connection handling
//!
//! Each accepted socket runs in its own task. The task splits the socket:
//! the read half feeds the receive loop, which hands every decoded frame to
//! the broadcaster; the write half belongs to a writer task that drains the
//! connection's outbound queue one whole frame at a time.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::protocol::{write_frame, FrameCodec, FrameReader};
use crate::registry::{Broadcaster, ConnectionId, Message, PeerHandle};
use crate::server::config::ServerConfig;
use crate::session::{CloseReason, ConnectionState};

/// One accepted client connection
pub struct Connection {
    socket: TcpStream,
    config: ServerConfig,
    broadcaster: Broadcaster,
    state: ConnectionState,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        socket: TcpStream,
        peer_addr: SocketAddr,
        config: ServerConfig,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            socket,
            config,
            broadcaster,
            state: ConnectionState::new(id, peer_addr),
        }
    }

    /// Drive the connection until the peer leaves or it is closed
    ///
    /// The connection is always removed from the registry before its socket
    /// is released, whatever ended it.
    pub async fn run(self) -> Result<()> {
        let Connection {
            socket,
            config,
            broadcaster,
            mut state,
        } = self;

        let codec = FrameCodec::new(config.max_frame_size);
        let (peer, rx) = PeerHandle::new(state.id, state.peer_addr, config.outbound_queue_capacity);
        let (read_half, write_half) = socket.into_split();
        let mut reader = FrameReader::with_capacity(read_half, codec, config.read_buffer_size);

        let mut writer = WriterTask(tokio::spawn(write_loop(
            write_half,
            rx,
            Arc::clone(&peer),
            codec,
            config.effective_write_timeout(),
        )));

        let registry = broadcaster.registry();
        let result = match registry.add(Arc::clone(&peer)).await {
            Ok(()) => {
                state.registered();
                state.activate();
                tracing::info!(
                    connection_id = %state.id,
                    peer = %state.peer_addr,
                    "Client connected"
                );
                receive_loop(&mut reader, &peer, &broadcaster).await
            }
            Err(e) => Err(e.into()),
        };

        // Deregister first so no broadcast can reach a released socket
        registry.remove(state.id).await;
        peer.close();

        let write_result = match (&mut writer.0).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(connection_id = %state.id, error = %e, "Writer task failed");
                Ok(())
            }
        };
        drop(reader);

        let reason = close_reason(&result, &write_result);
        state.start_closing(reason);
        state.removed();

        let stats = peer.stats().snapshot();
        tracing::info!(
            connection_id = %state.id,
            peer = %state.peer_addr,
            %reason,
            frames_received = stats.frames_received,
            frames_sent = stats.frames_sent,
            frames_dropped = stats.frames_dropped,
            duration_ms = stats.duration.as_millis() as u64,
            "Client disconnected"
        );

        result?;
        write_result
    }
}

/// Writer half of a connection, aborted if the connection task is dropped first
struct WriterTask(JoinHandle<Result<()>>);

impl Drop for WriterTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A write failure closes the peer from the writer side, so a `Closed`
/// receive loop defers to the writer's error
fn close_reason(read: &Result<CloseReason>, write: &Result<()>) -> CloseReason {
    match (read, write) {
        (Ok(CloseReason::Closed), Err(_)) => CloseReason::TransportError,
        (Ok(reason), _) => *reason,
        (Err(Error::Framing(_)), _) => CloseReason::FramingError,
        (Err(Error::Registry(_)), _) => CloseReason::Closed,
        (Err(_), _) => CloseReason::TransportError,
    }
}

async fn receive_loop(
    reader: &mut FrameReader<OwnedReadHalf>,
    peer: &PeerHandle,
    broadcaster: &Broadcaster,
) -> Result<CloseReason> {
    loop {
        let frame = tokio::select! {
            biased;
            _ = peer.closed() => return Ok(CloseReason::Closed),
            frame = reader.read_frame() => frame?,
        };

        let Some(payload) = frame else {
            return Ok(CloseReason::EndOfStream);
        };

        peer.stats().record_received(payload.len());
        tracing::debug!(
            connection_id = %peer.id(),
            bytes = payload.len(),
            "Frame received"
        );

        broadcaster.deliver(&Message::new(peer.id(), payload)).await;
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<Bytes>,
    peer: Arc<PeerHandle>,
    codec: FrameCodec,
    write_timeout: Duration,
) -> Result<()> {
    let result = drain_queue(&mut writer, &mut rx, &peer, &codec, write_timeout).await;

    if let Err(ref e) = result {
        tracing::debug!(connection_id = %peer.id(), error = %e, "Write failed");
        // Wake the receive loop so the connection is torn down
        peer.close();
    }

    if let Err(e) = writer.shutdown().await {
        tracing::trace!(connection_id = %peer.id(), error = %e, "Write half shutdown failed");
    }

    result
}

async fn drain_queue(
    writer: &mut OwnedWriteHalf,
    rx: &mut mpsc::Receiver<Bytes>,
    peer: &PeerHandle,
    codec: &FrameCodec,
    write_timeout: Duration,
) -> Result<()> {
    loop {
        // Only checked between frames, so a frame is never cut short by close
        let payload = tokio::select! {
            biased;
            _ = peer.closed() => return Ok(()),
            payload = rx.recv() => match payload {
                Some(payload) => payload,
                None => return Ok(()),
            },
        };

        tokio::time::timeout(write_timeout, write_frame(writer, codec, &payload))
            .await
            .map_err(|_| Error::WriteTimeout)??;

        peer.stats().record_sent(payload.len());
    }
}

//! Framed client connection

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::Result;
use crate::protocol::{write_frame, FrameCodec, FrameReader};

/// Client connection to a relay server
///
/// # Example
/// ```no_run
/// use relay_rs::client::RelayClient;
///
/// # async fn example() -> relay_rs::error::Result<()> {
/// let mut client = RelayClient::connect("127.0.0.1:12345").await?;
/// client.send("hello").await?;
///
/// while let Some(message) = client.recv().await? {
///     println!("{}", String::from_utf8_lossy(&message));
/// }
/// # Ok(())
/// # }
/// ```
pub struct RelayClient {
    reader: ClientReader,
    writer: ClientWriter,
}

impl RelayClient {
    /// Connect with the default frame size limit
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        Self::connect_with_codec(addr, FrameCodec::default()).await
    }

    /// Connect using `codec` for both directions
    pub async fn connect_with_codec<A: ToSocketAddrs>(addr: A, codec: FrameCodec) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let peer_addr = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();

        tracing::debug!(server = %peer_addr, "Connected to relay");

        Ok(Self {
            reader: ClientReader {
                inner: FrameReader::new(read_half, codec),
            },
            writer: ClientWriter {
                inner: write_half,
                codec,
                peer_addr,
            },
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.writer.peer_addr
    }

    /// Send one message
    pub async fn send(&mut self, payload: impl AsRef<[u8]>) -> Result<()> {
        self.writer.send(payload).await
    }

    /// Write raw bytes to the server without framing
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.send_raw(bytes).await
    }

    /// Receive the next relayed message; `None` once the server closed the stream
    pub async fn recv(&mut self) -> Result<Option<Bytes>> {
        self.reader.recv().await
    }

    /// Close the sending side; the server sees end of stream
    pub async fn close(self) -> Result<()> {
        let (_, mut writer) = self.into_split();
        writer.close().await
    }

    /// Split into independently usable halves
    pub fn into_split(self) -> (ClientReader, ClientWriter) {
        (self.reader, self.writer)
    }
}

/// Receiving half of a [`RelayClient`]
pub struct ClientReader {
    inner: FrameReader<OwnedReadHalf>,
}

impl ClientReader {
    /// Receive the next message; cancel-safe
    pub async fn recv(&mut self) -> Result<Option<Bytes>> {
        self.inner.read_frame().await
    }
}

/// Sending half of a [`RelayClient`]
pub struct ClientWriter {
    inner: OwnedWriteHalf,
    codec: FrameCodec,
    peer_addr: SocketAddr,
}

impl ClientWriter {
    /// Send one message as a single frame
    ///
    /// Payloads above the frame size limit are refused locally.
    pub async fn send(&mut self, payload: impl AsRef<[u8]>) -> Result<()> {
        write_frame(&mut self.inner, &self.codec, payload.as_ref()).await
    }

    /// Send raw bytes without framing
    ///
    /// Lets tests and tools put arbitrary (including malformed) data on the wire.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shut down the write direction
    pub async fn close(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

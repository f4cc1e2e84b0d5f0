//! TCP Channel Implementation
//!
//! Length-prefixed frame delivery over a TCP stream: each frame is preceded
//! by a 4-byte big-endian length. Read and write halves are locked
//! independently so one in-flight receive never blocks sends.

use super::{ChannelError, ChannelResult, NamingResolver, RawChannel};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// TCP channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpChannelConfig {
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Maximum frame size
    pub max_frame_size: usize,
    /// Initial capacity of the reusable read/write buffers
    pub buffer_size: usize,
}

impl Default for TcpChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            max_frame_size: 16 * 1024 * 1024, // 16MB
            buffer_size: 64 * 1024,           // 64KB
        }
    }
}

/// TCP-backed frame channel to one remote peer
#[derive(Debug)]
pub struct TcpChannel {
    config: TcpChannelConfig,
    peer_addr: SocketAddr,
    reader: Mutex<ReadState>,
    writer: Mutex<WriteState>,
}

#[derive(Debug)]
struct ReadState {
    half: OwnedReadHalf,
    buffer: BytesMut,
}

#[derive(Debug)]
struct WriteState {
    half: Option<OwnedWriteHalf>,
    buffer: BytesMut,
}

impl TcpChannel {
    /// Connect to an explicit address
    pub async fn connect_addr(
        addr: SocketAddr,
        config: TcpChannelConfig,
    ) -> ChannelResult<Self> {
        info!("Connecting to TCP peer at {}", addr);

        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                ChannelError::timeout("TCP connect", config.connect_timeout.as_millis() as u64)
            })?
            .map_err(|e| ChannelError::network_with_source("Failed to connect to TCP peer", e))?;

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        let peer_addr = stream
            .peer_addr()
            .map_err(|e| ChannelError::network_with_source("Failed to get peer address", e))?;
        let (read_half, write_half) = stream.into_split();

        info!("Connected to TCP peer at {}", peer_addr);
        Ok(Self {
            reader: Mutex::new(ReadState {
                half: read_half,
                buffer: BytesMut::with_capacity(config.buffer_size),
            }),
            writer: Mutex::new(WriteState {
                half: Some(write_half),
                buffer: BytesMut::with_capacity(config.buffer_size),
            }),
            config,
            peer_addr,
        })
    }

    /// Wrap an already-established stream, e.g. one returned by `accept`
    pub fn from_stream(stream: TcpStream, config: TcpChannelConfig) -> ChannelResult<Self> {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }
        let peer_addr = stream
            .peer_addr()
            .map_err(|e| ChannelError::network_with_source("Failed to get peer address", e))?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: Mutex::new(ReadState {
                half: read_half,
                buffer: BytesMut::with_capacity(config.buffer_size),
            }),
            writer: Mutex::new(WriteState {
                half: Some(write_half),
                buffer: BytesMut::with_capacity(config.buffer_size),
            }),
            config,
            peer_addr,
        })
    }

    /// Resolve a symbolic peer name and connect to it
    pub async fn connect_named(
        resolver: &dyn NamingResolver,
        name: &str,
        config: TcpChannelConfig,
    ) -> ChannelResult<Self> {
        let addr = resolver.resolve(name).await?;
        debug!(peer = name, %addr, "Resolved peer name");
        Self::connect_addr(addr, config).await
    }
}

#[async_trait]
impl RawChannel for TcpChannel {
    async fn send(&self, frame: &[u8]) -> ChannelResult<()> {
        if frame.len() > self.config.max_frame_size {
            return Err(ChannelError::FrameTooLarge {
                size: frame.len(),
                max: self.config.max_frame_size,
            });
        }

        let mut writer = self.writer.lock().await;
        // write_all needs simultaneous mutable access to half and buffer
        let WriteState { half, buffer } = &mut *writer;
        let half = half.as_mut().ok_or(ChannelError::Closed)?;

        // Reuse the write buffer: length prefix plus frame, one write call
        buffer.clear();
        buffer.extend_from_slice(&(frame.len() as u32).to_be_bytes());
        buffer.extend_from_slice(frame);

        half.write_all(buffer)
            .await
            .map_err(|e| ChannelError::network_with_source("Failed to write frame", e))?;
        half.flush()
            .await
            .map_err(|e| ChannelError::network_with_source("Failed to flush TCP stream", e))?;

        debug!(peer = %self.peer_addr, bytes = frame.len(), "Sent frame over TCP");
        Ok(())
    }

    async fn receive(&self) -> ChannelResult<Bytes> {
        let mut reader = self.reader.lock().await;

        let mut len_bytes = [0u8; 4];
        reader
            .half
            .read_exact(&mut len_bytes)
            .await
            .map_err(|e| ChannelError::network_with_source("Failed to read frame length", e))?;

        let frame_len = u32::from_be_bytes(len_bytes) as usize;
        if frame_len > self.config.max_frame_size {
            return Err(ChannelError::FrameTooLarge {
                size: frame_len,
                max: self.config.max_frame_size,
            });
        }

        if reader.buffer.capacity() < frame_len {
            let shortfall = frame_len - reader.buffer.capacity();
            reader.buffer.reserve(shortfall);
        }
        reader.buffer.resize(frame_len, 0);

        // read_exact needs simultaneous mutable access to half and buffer
        let ReadState { half, buffer } = &mut *reader;
        half.read_exact(buffer)
            .await
            .map_err(|e| ChannelError::network_with_source("Failed to read frame data", e))?;

        debug!(peer = %self.peer_addr, bytes = frame_len, "Received frame over TCP");
        Ok(reader.buffer.split_to(frame_len).freeze())
    }

    async fn close(&self) -> ChannelResult<()> {
        let mut writer = self.writer.lock().await;
        if let Some(mut half) = writer.half.take() {
            if let Err(e) = half.shutdown().await {
                warn!("Error shutting down TCP channel: {}", e);
            }
            info!("Closed TCP channel to {}", self.peer_addr);
        }
        Ok(())
    }

    fn peer_descriptor(&self) -> String {
        format!("tcp://{}", self.peer_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn tcp_pair() -> (TcpChannel, TcpChannel) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client =
            tokio::spawn(TcpChannel::connect_addr(addr, TcpChannelConfig::default()));
        let (stream, _) = listener.accept().await.unwrap();
        let server = TcpChannel::from_stream(stream, TcpChannelConfig::default()).unwrap();
        (client.await.unwrap().unwrap(), server)
    }

    #[tokio::test]
    async fn test_frames_cross_the_stream() {
        let (client, server) = tcp_pair().await;

        client.send(b"ping").await.unwrap();
        assert_eq!(server.receive().await.unwrap().as_ref(), b"ping");

        server.send(b"pong").await.unwrap();
        assert_eq!(client.receive().await.unwrap().as_ref(), b"pong");
    }

    #[tokio::test]
    async fn test_consecutive_sends_reuse_the_write_buffer() {
        let (client, server) = tcp_pair().await;

        for i in 0..3u8 {
            client.send(&[i; 16]).await.unwrap();
        }
        for i in 0..3u8 {
            assert_eq!(server.receive().await.unwrap().as_ref(), &[i; 16]);
        }
    }

    #[tokio::test]
    async fn test_send_after_close_is_rejected() {
        let (client, _server) = tcp_pair().await;
        client.close().await.unwrap();

        match client.send(b"late").await {
            Err(ChannelError::Closed) => {}
            other => panic!("expected Closed, got {:?}", other),
        }
    }
}

//! In-Memory Channel Pair
//!
//! A bidirectional in-process channel used by the scripted test peer and by
//! unit tests that need a connection without sockets. Closing either end
//! makes both directions resolve [`ChannelError::Closed`].

use super::{ChannelError, ChannelResult, RawChannel};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// One end of an in-memory frame channel
pub struct MemoryChannel {
    name: &'static str,
    outgoing: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    incoming: Mutex<mpsc::UnboundedReceiver<Bytes>>,
}

/// Create a connected pair of in-memory channels
pub fn memory_channel_pair() -> (MemoryChannel, MemoryChannel) {
    let (to_b, from_a) = mpsc::unbounded_channel();
    let (to_a, from_b) = mpsc::unbounded_channel();
    (
        MemoryChannel {
            name: "memory-a",
            outgoing: Mutex::new(Some(to_b)),
            incoming: Mutex::new(from_b),
        },
        MemoryChannel {
            name: "memory-b",
            outgoing: Mutex::new(Some(to_a)),
            incoming: Mutex::new(from_a),
        },
    )
}

impl fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryChannel")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl RawChannel for MemoryChannel {
    async fn send(&self, frame: &[u8]) -> ChannelResult<()> {
        let outgoing = self.outgoing.lock().await;
        let sender = outgoing.as_ref().ok_or(ChannelError::Closed)?;
        sender
            .send(Bytes::copy_from_slice(frame))
            .map_err(|_| ChannelError::Closed)?;
        debug!(channel = self.name, bytes = frame.len(), "Sent in-memory frame");
        Ok(())
    }

    async fn receive(&self) -> ChannelResult<Bytes> {
        let mut incoming = self.incoming.lock().await;
        incoming.recv().await.ok_or(ChannelError::Closed)
    }

    async fn close(&self) -> ChannelResult<()> {
        // Dropping the sender delivers EOF to the peer's receive loop
        self.outgoing.lock().await.take();
        debug!(channel = self.name, "Closed in-memory channel");
        Ok(())
    }

    fn peer_descriptor(&self) -> String {
        format!("memory://{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_cross_the_pair() {
        let (a, b) = memory_channel_pair();
        a.send(b"ping").await.unwrap();
        assert_eq!(b.receive().await.unwrap().as_ref(), b"ping");

        b.send(b"pong").await.unwrap();
        assert_eq!(a.receive().await.unwrap().as_ref(), b"pong");
    }

    #[tokio::test]
    async fn test_close_propagates_to_peer() {
        let (a, b) = memory_channel_pair();
        a.close().await.unwrap();

        match b.receive().await {
            Err(ChannelError::Closed) => {}
            other => panic!("expected Closed, got {:?}", other),
        }
        match a.send(b"late").await {
            Err(ChannelError::Closed) => {}
            other => panic!("expected Closed, got {:?}", other),
        }
    }
}

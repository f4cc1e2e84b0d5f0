//! Transport Collaborators
//!
//! The runtime does not implement framing-level protocol negotiation or
//! encryption; it depends on a [`RawChannel`] that delivers whole frames
//! reliably and in order, and on a [`NamingResolver`] that turns a symbolic
//! peer name into a connection target. Resolver failures are surfaced to
//! callers as no-such-receiver.

pub mod memory;
pub mod tcp;

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use thiserror::Error;

pub use memory::{memory_channel_pair, MemoryChannel};
pub use tcp::{TcpChannel, TcpChannelConfig};

/// Transport-level failures, below the invocation taxonomy
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Network connectivity failure
    #[error("Network error: {message}")]
    Network {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The channel has been closed locally or by the peer
    #[error("Channel closed")]
    Closed,

    /// Channel operation exceeded its deadline
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Frame exceeds the configured size limit
    #[error("Frame size {size} exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Symbolic name did not resolve to a connection target
    #[error("Name '{name}' did not resolve: {message}")]
    Unresolved { name: String, message: String },
}

impl ChannelError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create an unresolved-name error
    pub fn unresolved(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unresolved {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result type for channel operations
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

/// Ordered, reliable, whole-frame byte channel to one peer
///
/// One frame in equals one frame out; the channel owns the byte-level
/// framing. `receive` is driven by exactly one reader task per connection.
#[async_trait]
pub trait RawChannel: Send + Sync + fmt::Debug {
    /// Transmit one frame
    async fn send(&self, frame: &[u8]) -> ChannelResult<()>;

    /// Receive the next frame, pending until one arrives or the channel closes
    async fn receive(&self) -> ChannelResult<Bytes>;

    /// Close the channel; pending receives resolve with [`ChannelError::Closed`]
    async fn close(&self) -> ChannelResult<()>;

    /// Human-readable peer description for logs and errors
    fn peer_descriptor(&self) -> String;
}

/// Naming/directory collaborator: symbolic name to connection target
#[async_trait]
pub trait NamingResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> ChannelResult<SocketAddr>;
}

/// Fixed-table resolver for explicit wiring and tests
#[derive(Debug, Default)]
pub struct StaticResolver {
    entries: HashMap<String, SocketAddr>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, name: impl Into<String>, target: SocketAddr) -> Self {
        self.entries.insert(name.into(), target);
        self
    }
}

#[async_trait]
impl NamingResolver for StaticResolver {
    async fn resolve(&self, name: &str) -> ChannelResult<SocketAddr> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| ChannelError::unresolved(name, "no entry registered"))
    }
}

//! Scripted In-Process Peer
//!
//! Test-side counterpart of a remote container: decodes request frames from
//! an in-memory channel, hands them to a [`PeerHandler`] and sends the
//! outcome back under the same correlation id. Each request is served on its
//! own task, so a deliberately slow handler never blocks responses for other
//! correlation ids and responses may arrive out of order.

use crate::connection::{Connection, ModuleIdent};
use crate::transport::{memory_channel_pair, ChannelError, RawChannel};
use async_trait::async_trait;
use codec::{Frame, RequestFrame, ResponseFrame, ResponseOutcome};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Server-side request logic for a scripted peer
#[async_trait]
pub trait PeerHandler: Send + Sync + 'static {
    async fn handle(&self, request: RequestFrame) -> ResponseOutcome;
}

/// Serve requests arriving on `channel` until it closes
pub fn spawn_peer(
    channel: Arc<dyn RawChannel>,
    handler: Arc<dyn PeerHandler>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let bytes = match channel.receive().await {
                Ok(bytes) => bytes,
                Err(ChannelError::Closed) => break,
                Err(e) => {
                    warn!(error = %e, "Scripted peer receive failed");
                    break;
                }
            };

            let request = match codec::decode_frame(&bytes) {
                Ok(Frame::Request(request)) => request,
                Ok(Frame::Response(response)) => {
                    warn!(
                        correlation = response.correlation_id,
                        "Scripted peer ignoring response frame"
                    );
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "Scripted peer ignoring undecodable frame");
                    continue;
                }
            };

            // One task per request: slow handlers must not serialize replies
            let channel = Arc::clone(&channel);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let correlation_id = request.correlation_id;
                let outcome = handler.handle(request).await;
                let frame = Frame::Response(ResponseFrame {
                    correlation_id,
                    outcome,
                });
                match codec::encode_frame(&frame) {
                    Ok(encoded) => {
                        if let Err(e) = channel.send(&encoded).await {
                            debug!(error = %e, "Scripted peer reply dropped");
                        }
                    }
                    Err(e) => warn!(error = %e, "Scripted peer failed to encode reply"),
                }
            });
        }
        debug!("Scripted peer finished");
    })
}

/// Open a connection wired to a scripted peer over an in-memory channel
///
/// Returns the client-side connection and the peer task handle.
pub fn connected_peer(
    peer_name: &str,
    capabilities: Vec<ModuleIdent>,
    handler: Arc<dyn PeerHandler>,
) -> (Arc<Connection>, JoinHandle<()>) {
    let (client_end, peer_end) = memory_channel_pair();
    let peer_task = spawn_peer(Arc::new(peer_end), handler);
    let connection = Connection::open(peer_name, capabilities, Arc::new(client_end));
    (connection, peer_task)
}

//! Connection and Request Correlation
//!
//! A `Connection` is one multiplexed channel to one peer. It owns the
//! monotonic correlation id generator, the in-flight request table and the
//! single reader task that delivers responses. The table lock is held only
//! for insert/lookup/remove; resolution and interceptor hooks always run
//! outside it.

use crate::completion::{CompletionCell, Resolution};
use crate::error::{InvocationError, Result};
use crate::transport::{ChannelError, RawChannel};
use codec::{Frame, RequestFrame, ResponseOutcome};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use types::Locator;
use uuid::Uuid;

/// Correlation ids at or above this value are never handed out. The margin
/// below `u64::MAX` keeps concurrent allocations from wrapping the counter
/// once the connection is exhausted.
const CORRELATION_ID_LIMIT: u64 = u64::MAX - (1 << 32);

/// Unique connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0.simple())
    }
}

/// One application/module pairing a peer advertises it can serve
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleIdent {
    pub app: String,
    pub module: String,
    pub distinct_name: String,
}

impl ModuleIdent {
    pub fn new(
        app: impl Into<String>,
        module: impl Into<String>,
        distinct_name: impl Into<String>,
    ) -> Self {
        Self {
            app: app.into(),
            module: module.into(),
            distinct_name: distinct_name.into(),
        }
    }

    /// Whether this capability covers the locator's target module
    pub fn covers(&self, locator: &Locator) -> bool {
        self.app == locator.app()
            && self.module == locator.module()
            && self.distinct_name == locator.distinct_name()
    }
}

/// Connection liveness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closing,
    Closed,
}

/// Client-side bookkeeping for one in-flight request
#[derive(Debug, Clone)]
pub struct PendingInvocation {
    correlation_id: u64,
    locator: Locator,
    cell: Arc<CompletionCell>,
}

impl PendingInvocation {
    pub fn correlation_id(&self) -> u64 {
        self.correlation_id
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub(crate) fn cell(&self) -> &Arc<CompletionCell> {
        &self.cell
    }
}

/// Multiplexed channel to one peer with request correlation
pub struct Connection {
    id: ConnectionId,
    peer_name: String,
    capabilities: Vec<ModuleIdent>,
    channel: Arc<dyn RawChannel>,
    state: Mutex<ConnectionState>,
    next_correlation: AtomicU64,
    pending: Mutex<HashMap<u64, PendingInvocation>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_name", &self.peer_name)
            .field("state", &*self.state.lock())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

impl Connection {
    /// Open a connection over an established channel and start its reader task
    ///
    /// `capabilities` is the set of application modules the peer advertises;
    /// the receiver selector matches locators against it.
    pub fn open(
        peer_name: impl Into<String>,
        capabilities: Vec<ModuleIdent>,
        channel: Arc<dyn RawChannel>,
    ) -> Arc<Self> {
        let connection = Arc::new(Self {
            id: ConnectionId::new(),
            peer_name: peer_name.into(),
            capabilities,
            channel,
            state: Mutex::new(ConnectionState::Open),
            next_correlation: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            reader: Mutex::new(None),
        });

        let handle = tokio::spawn(Self::reader_loop(Arc::clone(&connection)));
        *connection.reader.lock() = Some(handle);

        info!(
            connection = %connection.id,
            peer = %connection.peer_name,
            "Opened connection"
        );
        connection
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_name(&self) -> &str {
        &self.peer_name
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Whether this connection advertises capability for the locator's module
    pub fn serves(&self, locator: &Locator) -> bool {
        self.capabilities.iter().any(|cap| cap.covers(locator))
    }

    /// Number of in-flight requests (diagnostics and tests)
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Allocate a fresh correlation id, unique for this connection's lifetime
    ///
    /// Exhausting the id space means the generator would wrap and reuse
    /// live ids; that is a fatal condition, not a recoverable one.
    pub(crate) fn allocate_correlation_id(&self) -> Result<u64> {
        let id = self.next_correlation.fetch_add(1, Ordering::SeqCst);
        if id >= CORRELATION_ID_LIMIT {
            // Pin the counter at the limit so every later allocation fails
            // too, instead of eventually wrapping and reusing live ids. The
            // gap below u64::MAX absorbs concurrent fetch_adds racing past
            // the limit before one of them re-pins it.
            self.next_correlation
                .store(CORRELATION_ID_LIMIT, Ordering::SeqCst);
            return Err(InvocationError::system(
                "Correlation id space exhausted on connection",
            ));
        }
        Ok(id)
    }

    /// Register the request in the in-flight table and transmit it
    ///
    /// The returned [`PendingInvocation`] resolves when the matching
    /// response arrives, or when this connection closes.
    pub(crate) async fn send_request(&self, request: RequestFrame) -> Result<PendingInvocation> {
        if !self.is_open() {
            return Err(InvocationError::system(format!(
                "Connection {} to {} is not open",
                self.id, self.peer_name
            )));
        }

        let pending = PendingInvocation {
            correlation_id: request.correlation_id,
            locator: request.locator.clone(),
            cell: CompletionCell::new(),
        };
        self.pending
            .lock()
            .insert(pending.correlation_id, pending.clone());

        let encoded = codec::encode_frame(&Frame::Request(request))?;
        if let Err(send_error) = self.channel.send(&encoded).await {
            // The request never left; take it back out before reporting
            self.pending.lock().remove(&pending.correlation_id);
            self.close("transport failure on send").await;
            return Err(InvocationError::system_with_source(
                format!("Failed to send request to {}", self.peer_name),
                &send_error,
            ));
        }

        debug!(
            connection = %self.id,
            correlation = pending.correlation_id,
            target = %pending.locator,
            "Request dispatched"
        );
        Ok(pending)
    }

    /// Deliver a response into the matching pending invocation
    ///
    /// Unknown, late or duplicate correlation ids are discarded and logged;
    /// they never disturb the connection or other in-flight requests.
    fn on_response(&self, correlation_id: u64, outcome: ResponseOutcome) {
        let pending = self.pending.lock().remove(&correlation_id);
        match pending {
            Some(pending) => {
                debug!(
                    connection = %self.id,
                    correlation = correlation_id,
                    "Response delivered"
                );
                pending.cell.resolve(Ok(outcome));
            }
            None => {
                warn!(
                    connection = %self.id,
                    correlation = correlation_id,
                    "Discarding response with unknown correlation id"
                );
            }
        }
    }

    /// Cancel an in-flight request locally
    ///
    /// The entry leaves the table; a late response for this id is discarded
    /// as unknown. The peer may still execute the request.
    pub(crate) fn cancel(&self, correlation_id: u64) {
        if self.pending.lock().remove(&correlation_id).is_some() {
            debug!(
                connection = %self.id,
                correlation = correlation_id,
                "Cancelled pending invocation"
            );
        }
    }

    /// Close the connection, resolving every pending invocation
    ///
    /// Mandatory cleanup: nothing stays pending past closure. Idempotent.
    pub async fn close(&self, reason: &str) {
        {
            let mut state = self.state.lock();
            if *state != ConnectionState::Open {
                return;
            }
            *state = ConnectionState::Closing;
        }

        info!(connection = %self.id, peer = %self.peer_name, reason, "Closing connection");

        let drained: Vec<PendingInvocation> = {
            let mut pending = self.pending.lock();
            pending.drain().map(|(_, p)| p).collect()
        };
        let resolution: Resolution = Err(InvocationError::system(format!(
            "Connection to {} closed: {}",
            self.peer_name, reason
        )));
        for pending in drained {
            pending.cell.resolve(resolution.clone());
        }

        if let Err(e) = self.channel.close().await {
            warn!(connection = %self.id, error = %e, "Error closing channel");
        }

        // The reader may be parked in receive(); closing our own end does
        // not wake it, so stop it explicitly. Harmless when close() runs on
        // the reader task itself: it finishes without another await point.
        if let Some(handle) = self.reader.lock().take() {
            handle.abort();
        }
        *self.state.lock() = ConnectionState::Closed;
    }

    /// Single completion path: reads frames until the channel closes
    async fn reader_loop(connection: Arc<Connection>) {
        loop {
            match connection.channel.receive().await {
                Ok(bytes) => match codec::decode_frame(&bytes) {
                    Ok(Frame::Response(response)) => {
                        connection.on_response(response.correlation_id, response.outcome);
                    }
                    Ok(Frame::Request(request)) => {
                        warn!(
                            connection = %connection.id,
                            correlation = request.correlation_id,
                            "Discarding unexpected request frame from peer"
                        );
                    }
                    Err(decode_error) => {
                        warn!(
                            connection = %connection.id,
                            error = %decode_error,
                            "Discarding undecodable frame"
                        );
                    }
                },
                Err(ChannelError::Closed) => {
                    connection.close("channel closed by peer").await;
                    break;
                }
                Err(receive_error) => {
                    connection
                        .close(&format!("transport failure: {}", receive_error))
                        .await;
                    break;
                }
            }
        }
        debug!(connection = %connection.id, "Reader task finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory_channel_pair;
    use codec::ResponseFrame;

    fn capabilities() -> Vec<ModuleIdent> {
        vec![ModuleIdent::new("shop-app", "orders", "")]
    }

    async fn respond(peer: &dyn RawChannel, correlation_id: u64, outcome: ResponseOutcome) {
        let frame = Frame::Response(ResponseFrame {
            correlation_id,
            outcome,
        });
        peer.send(&codec::encode_frame(&frame).unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_and_correlate() {
        let (client_end, peer_end) = memory_channel_pair();
        let connection = Connection::open("peer-one", capabilities(), Arc::new(client_end));

        let locator = Locator::stateless("shop-app", "orders", "EchoBean", "", "EchoRemote");
        let id = connection.allocate_correlation_id().unwrap();
        let pending = connection
            .send_request(RequestFrame::invoke(id, locator, "echo", b"hi".to_vec()))
            .await
            .unwrap();
        assert_eq!(connection.pending_count(), 1);

        respond(&peer_end, id, ResponseOutcome::Value(b"hi".to_vec())).await;

        match pending.cell().wait().await {
            Ok(ResponseOutcome::Value(v)) => assert_eq!(v, b"hi".to_vec()),
            other => panic!("unexpected resolution {:?}", other),
        }
        // table entry removed on delivery
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_correlation_ids_are_monotonic() {
        let (client_end, _peer_end) = memory_channel_pair();
        let connection = Connection::open("peer-one", capabilities(), Arc::new(client_end));

        let first = connection.allocate_correlation_id().unwrap();
        let second = connection.allocate_correlation_id().unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_correlation_exhaustion_is_sticky() {
        let (client_end, _peer_end) = memory_channel_pair();
        let connection = Connection::open("peer-one", capabilities(), Arc::new(client_end));

        connection
            .next_correlation
            .store(CORRELATION_ID_LIMIT, Ordering::SeqCst);

        // Every allocation fails from here on; the counter must stay pinned
        // rather than wrap back into ids that could still be live.
        for _ in 0..3 {
            assert!(connection.allocate_correlation_id().is_err());
            assert_eq!(
                connection.next_correlation.load(Ordering::SeqCst),
                CORRELATION_ID_LIMIT
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_correlation_id_is_discarded() {
        let (client_end, peer_end) = memory_channel_pair();
        let connection = Connection::open("peer-one", capabilities(), Arc::new(client_end));

        // A response nobody asked for: must not disturb the connection
        respond(&peer_end, 999, ResponseOutcome::Value(Vec::new())).await;
        tokio::task::yield_now().await;
        assert!(connection.is_open());

        // Subsequent sends with fresh ids still succeed
        let locator = Locator::stateless("shop-app", "orders", "EchoBean", "", "EchoRemote");
        let id = connection.allocate_correlation_id().unwrap();
        let pending = connection
            .send_request(RequestFrame::invoke(id, locator, "echo", Vec::new()))
            .await
            .unwrap();
        respond(&peer_end, id, ResponseOutcome::Value(b"ok".to_vec())).await;
        assert!(pending.cell().wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_invocation_ignores_late_response() {
        let (client_end, peer_end) = memory_channel_pair();
        let connection = Connection::open("peer-one", capabilities(), Arc::new(client_end));

        let locator = Locator::stateless("shop-app", "orders", "EchoBean", "", "EchoRemote");
        let id = connection.allocate_correlation_id().unwrap();
        let pending = connection
            .send_request(RequestFrame::invoke(id, locator, "slow", Vec::new()))
            .await
            .unwrap();

        connection.cancel(id);
        assert_eq!(connection.pending_count(), 0);

        // Late response is discarded as unknown, cell stays unresolved
        respond(&peer_end, id, ResponseOutcome::Value(Vec::new())).await;
        tokio::task::yield_now().await;
        assert!(!pending.cell().is_resolved());
        assert!(connection.is_open());
    }

    #[tokio::test]
    async fn test_close_resolves_all_pending() {
        let (client_end, _peer_end) = memory_channel_pair();
        let connection = Connection::open("peer-one", capabilities(), Arc::new(client_end));

        let locator = Locator::stateless("shop-app", "orders", "EchoBean", "", "EchoRemote");
        let mut cells = Vec::new();
        for _ in 0..3 {
            let id = connection.allocate_correlation_id().unwrap();
            let pending = connection
                .send_request(RequestFrame::invoke(id, locator.clone(), "slow", Vec::new()))
                .await
                .unwrap();
            cells.push(Arc::clone(pending.cell()));
        }
        assert_eq!(connection.pending_count(), 3);

        connection.close("test shutdown").await;
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(connection.pending_count(), 0);

        for cell in cells {
            match cell.wait().await {
                Err(InvocationError::System { message, .. }) => {
                    assert!(message.contains("closed"));
                }
                other => panic!("expected connection-closed system error, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_peer_disconnect_closes_connection() {
        let (client_end, peer_end) = memory_channel_pair();
        let connection = Connection::open("peer-one", capabilities(), Arc::new(client_end));

        let locator = Locator::stateless("shop-app", "orders", "EchoBean", "", "EchoRemote");
        let id = connection.allocate_correlation_id().unwrap();
        let pending = connection
            .send_request(RequestFrame::invoke(id, locator, "echo", Vec::new()))
            .await
            .unwrap();

        peer_end.close().await.unwrap();
        assert!(pending.cell().wait().await.is_err());
        // the reader task may still be finishing the Closing -> Closed step
        assert!(!connection.is_open());
    }

    #[tokio::test]
    async fn test_send_on_closed_connection_fails() {
        let (client_end, _peer_end) = memory_channel_pair();
        let connection = Connection::open("peer-one", capabilities(), Arc::new(client_end));
        connection.close("test").await;

        let locator = Locator::stateless("shop-app", "orders", "EchoBean", "", "EchoRemote");
        let err = connection
            .send_request(RequestFrame::invoke(1, locator, "echo", Vec::new()))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "system");
    }

    #[test]
    fn test_module_ident_matching() {
        let cap = ModuleIdent::new("shop-app", "orders", "");
        let matching = Locator::stateless("shop-app", "orders", "EchoBean", "", "EchoRemote");
        let wrong_module = Locator::stateless("shop-app", "billing", "EchoBean", "", "EchoRemote");
        let wrong_distinct =
            Locator::stateless("shop-app", "orders", "EchoBean", "node-2", "EchoRemote");

        assert!(cap.covers(&matching));
        assert!(!cap.covers(&wrong_module));
        assert!(!cap.covers(&wrong_distinct));
    }
}

//! Client Context
//!
//! The per-logical-client registry of live connections, module affinity and
//! the current transaction token. There is no implicit global or
//! thread-local context: callers hold an `Arc<ClientContext>` and pass it to
//! the proxies they build. A suspended or destroyed context fails new
//! invocations fast while leaving nothing unresolved.

use crate::connection::{Connection, ConnectionId};
use crate::error::{InvocationError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Opaque transaction-context token attached to outgoing requests
///
/// The runtime never interprets it; an interceptor attaches it and the peer
/// consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionToken(Vec<u8>);

impl TransactionToken {
    pub fn new(token: Vec<u8>) -> Self {
        Self(token)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Context lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextState {
    Active,
    Suspended,
    Destroyed,
}

/// Registry of connections and invocation-scoped state
pub struct ClientContext {
    connections: RwLock<Vec<Arc<Connection>>>,
    affinity: RwLock<HashMap<(String, String), ConnectionId>>,
    transaction: RwLock<Option<TransactionToken>>,
    state: RwLock<ContextState>,
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("connections", &self.connections.read().len())
            .field("state", &*self.state.read())
            .finish()
    }
}

impl ClientContext {
    /// Create an empty, active context
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connections: RwLock::new(Vec::new()),
            affinity: RwLock::new(HashMap::new()),
            transaction: RwLock::new(None),
            state: RwLock::new(ContextState::Active),
        })
    }

    /// Register a connection; registration order is the selection tie-break
    pub fn register_connection(&self, connection: Arc<Connection>) {
        info!(connection = %connection.id(), peer = %connection.peer_name(), "Registering connection");
        self.connections.write().push(connection);
    }

    /// Deregister a connection; it is not closed, only removed from selection
    pub fn deregister_connection(&self, id: ConnectionId) {
        debug!(connection = %id, "Deregistering connection");
        self.connections.write().retain(|c| c.id() != id);
        self.affinity.write().retain(|_, bound| *bound != id);
    }

    /// Consistent snapshot of registered connections, in registration order
    pub fn connections_snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().clone()
    }

    /// Bind the current transaction token, replacing any previous binding
    pub fn bind_transaction(&self, token: TransactionToken) {
        *self.transaction.write() = Some(token);
    }

    /// Clear the current transaction binding
    pub fn clear_transaction(&self) {
        *self.transaction.write() = None;
    }

    /// The currently bound transaction token, if any
    pub fn current_transaction(&self) -> Option<TransactionToken> {
        self.transaction.read().clone()
    }

    /// Suspend the context: new invocations fail fast, connections stay up
    pub fn suspend(&self) {
        let mut state = self.state.write();
        if *state == ContextState::Active {
            info!("Suspending client context");
            *state = ContextState::Suspended;
        }
    }

    /// Resume a suspended context
    pub fn resume(&self) {
        let mut state = self.state.write();
        if *state == ContextState::Suspended {
            info!("Resuming client context");
            *state = ContextState::Active;
        }
    }

    pub fn is_active(&self) -> bool {
        *self.state.read() == ContextState::Active
    }

    /// Fail-fast guard used at every dispatch entry point
    pub(crate) fn ensure_active(&self) -> Result<()> {
        match *self.state.read() {
            ContextState::Active => Ok(()),
            ContextState::Suspended => Err(InvocationError::usage(
                "Client context is suspended; no invocations accepted",
            )),
            ContextState::Destroyed => Err(InvocationError::usage(
                "Client context is destroyed; no invocations accepted",
            )),
        }
    }

    /// Destroy the context and close every registered connection
    ///
    /// Closing resolves all in-flight invocations with a connection-closed
    /// system error; none are left orphaned.
    pub async fn destroy(&self) {
        let connections: Vec<Arc<Connection>> = {
            let mut state = self.state.write();
            if *state == ContextState::Destroyed {
                return;
            }
            *state = ContextState::Destroyed;
            self.connections.write().drain(..).collect()
        };
        self.affinity.write().clear();

        info!(count = connections.len(), "Destroying client context");
        for connection in connections {
            connection.close("client context destroyed").await;
        }
    }

    /// Record that a connection served an application module
    pub(crate) fn record_affinity(&self, app: &str, module: &str, id: ConnectionId) {
        self.affinity
            .write()
            .insert((app.to_string(), module.to_string()), id);
    }

    /// Connection that last served the application module, if any
    pub(crate) fn affinity_for(&self, app: &str, module: &str) -> Option<ConnectionId> {
        self.affinity
            .read()
            .get(&(app.to_string(), module.to_string()))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ModuleIdent;
    use crate::transport::memory_channel_pair;

    fn open_connection(peer: &str) -> (Arc<Connection>, crate::transport::MemoryChannel) {
        let (client_end, peer_end) = memory_channel_pair();
        let connection = Connection::open(
            peer,
            vec![ModuleIdent::new("shop-app", "orders", "")],
            Arc::new(client_end),
        );
        (connection, peer_end)
    }

    #[tokio::test]
    async fn test_register_and_deregister() {
        let context = ClientContext::new();
        let (connection, _peer) = open_connection("peer-one");
        let id = connection.id();

        context.register_connection(connection);
        assert_eq!(context.connections_snapshot().len(), 1);

        context.deregister_connection(id);
        assert!(context.connections_snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_deregister_drops_affinity() {
        let context = ClientContext::new();
        let (connection, _peer) = open_connection("peer-one");
        let id = connection.id();
        context.register_connection(connection);

        context.record_affinity("shop-app", "orders", id);
        assert_eq!(context.affinity_for("shop-app", "orders"), Some(id));

        context.deregister_connection(id);
        assert_eq!(context.affinity_for("shop-app", "orders"), None);
    }

    #[tokio::test]
    async fn test_suspend_fails_fast_and_resume_recovers() {
        let context = ClientContext::new();
        assert!(context.ensure_active().is_ok());

        context.suspend();
        let err = context.ensure_active().unwrap_err();
        assert_eq!(err.category(), "usage");

        context.resume();
        assert!(context.ensure_active().is_ok());
    }

    #[tokio::test]
    async fn test_destroy_closes_connections() {
        let context = ClientContext::new();
        let (connection, _peer) = open_connection("peer-one");
        context.register_connection(Arc::clone(&connection));

        context.destroy().await;
        assert!(!connection.is_open());
        assert!(context.ensure_active().is_err());
        assert!(context.connections_snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_binding() {
        let context = ClientContext::new();
        assert!(context.current_transaction().is_none());

        context.bind_transaction(TransactionToken::new(vec![0xAB]));
        assert_eq!(
            context.current_transaction().unwrap().as_bytes(),
            &[0xAB]
        );

        context.clear_transaction();
        assert!(context.current_transaction().is_none());
    }
}

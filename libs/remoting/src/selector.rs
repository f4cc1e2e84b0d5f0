//! Receiver Selector
//!
//! Picks the connection that will carry one invocation. Selection runs on
//! every call against a fresh snapshot, so a connection closed between calls
//! is never reused. Preference order: the connection with recorded affinity
//! for the locator's application module, then the first-registered open
//! connection advertising capability for it. Equal-affinity ties break
//! toward first registration.

use crate::connection::Connection;
use crate::context::ClientContext;
use crate::error::{InvocationError, Result};
use std::sync::Arc;
use tracing::debug;
use types::Locator;

/// Select the connection serving this locator
pub fn select_receiver(context: &ClientContext, locator: &Locator) -> Result<Arc<Connection>> {
    let snapshot = context.connections_snapshot();

    // Affinity first: the connection that previously served this module
    if let Some(bound_id) = context.affinity_for(locator.app(), locator.module()) {
        if let Some(connection) = snapshot
            .iter()
            .find(|c| c.id() == bound_id && c.is_open() && c.serves(locator))
        {
            debug!(
                connection = %connection.id(),
                target = %locator,
                "Selected receiver by affinity"
            );
            return Ok(Arc::clone(connection));
        }
    }

    // Otherwise the first-registered open connection with capability
    if let Some(connection) = snapshot.iter().find(|c| c.is_open() && c.serves(locator)) {
        context.record_affinity(locator.app(), locator.module(), connection.id());
        debug!(
            connection = %connection.id(),
            target = %locator,
            "Selected receiver by capability"
        );
        return Ok(Arc::clone(connection));
    }

    Err(InvocationError::no_such_receiver(format!(
        "No registered connection serves {}",
        locator
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ModuleIdent;
    use crate::transport::memory_channel_pair;

    fn open_connection(
        peer: &str,
        app: &str,
        module: &str,
    ) -> (Arc<Connection>, crate::transport::MemoryChannel) {
        let (client_end, peer_end) = memory_channel_pair();
        let connection = Connection::open(
            peer,
            vec![ModuleIdent::new(app, module, "")],
            Arc::new(client_end),
        );
        (connection, peer_end)
    }

    fn orders_locator() -> Locator {
        Locator::stateless("shop-app", "orders", "EchoBean", "", "EchoRemote")
    }

    #[tokio::test]
    async fn test_no_matching_connection_is_no_such_receiver() {
        let context = ClientContext::new();
        let (other, _other_peer) = open_connection("peer-one", "other-app", "other");
        context.register_connection(other);

        let err = select_receiver(&context, &orders_locator()).unwrap_err();
        assert_eq!(err.category(), "no_such_receiver");
    }

    #[tokio::test]
    async fn test_first_registered_wins_ties() {
        let context = ClientContext::new();
        let (first, _first_peer) = open_connection("peer-one", "shop-app", "orders");
        let (second, _second_peer) = open_connection("peer-two", "shop-app", "orders");
        context.register_connection(Arc::clone(&first));
        context.register_connection(Arc::clone(&second));

        let selected = select_receiver(&context, &orders_locator()).unwrap();
        assert_eq!(selected.id(), first.id());
    }

    #[tokio::test]
    async fn test_affinity_is_sticky_while_connection_lives() {
        let context = ClientContext::new();
        let (first, _first_peer) = open_connection("peer-one", "shop-app", "orders");
        let (second, _second_peer) = open_connection("peer-two", "shop-app", "orders");
        context.register_connection(Arc::clone(&first));
        context.register_connection(Arc::clone(&second));

        // First selection records affinity to the first connection
        let selected = select_receiver(&context, &orders_locator()).unwrap();
        assert_eq!(selected.id(), first.id());

        // Re-selection sticks with it
        let selected = select_receiver(&context, &orders_locator()).unwrap();
        assert_eq!(selected.id(), first.id());
    }

    #[tokio::test]
    async fn test_closed_connection_is_never_reused() {
        let context = ClientContext::new();
        let (first, _first_peer) = open_connection("peer-one", "shop-app", "orders");
        let (second, _second_peer) = open_connection("peer-two", "shop-app", "orders");
        context.register_connection(Arc::clone(&first));
        context.register_connection(Arc::clone(&second));

        // Bind affinity to the first, then close it
        select_receiver(&context, &orders_locator()).unwrap();
        first.close("test").await;

        let selected = select_receiver(&context, &orders_locator()).unwrap();
        assert_eq!(selected.id(), second.id());
    }

    #[tokio::test]
    async fn test_stateful_locator_selects_by_module() {
        let context = ClientContext::new();
        let (connection, _peer) = open_connection("peer-one", "shop-app", "orders");
        context.register_connection(Arc::clone(&connection));

        let locator = Locator::stateful_unbound("shop-app", "orders", "CounterBean", "", "Counter");
        let selected = select_receiver(&context, &locator).unwrap();
        assert_eq!(selected.id(), connection.id());
    }
}

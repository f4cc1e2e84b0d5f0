//! Remote Component Locators
//!
//! A `Locator` names one view of one remote component: application, module,
//! component name, distinct-name and the business view the caller wants.
//! Locators are immutable value objects; binding a session produces a new
//! locator rather than mutating the old one.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a locator addresses per-session server state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// No server-side conversational state; any instance may serve the call
    Stateless,
    /// Server-side conversational state addressed by a session identifier
    Stateful,
}

/// Immutable identity of a remote component view
///
/// Two locators are equal iff every field matches, including the bound
/// session. A stateful locator starts unbound (`session == None`) and is
/// bound via [`Locator::for_session`] once the session has been created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    app: String,
    module: String,
    component: String,
    distinct_name: String,
    view: String,
    kind: TargetKind,
    session: Option<SessionId>,
}

impl Locator {
    /// Create a locator for a stateless target
    pub fn stateless(
        app: impl Into<String>,
        module: impl Into<String>,
        component: impl Into<String>,
        distinct_name: impl Into<String>,
        view: impl Into<String>,
    ) -> Self {
        Self {
            app: app.into(),
            module: module.into(),
            component: component.into(),
            distinct_name: distinct_name.into(),
            view: view.into(),
            kind: TargetKind::Stateless,
            session: None,
        }
    }

    /// Create an unbound locator for a stateful target
    ///
    /// The caller must create a session and bind it with
    /// [`Locator::for_session`] before invoking through a proxy.
    pub fn stateful_unbound(
        app: impl Into<String>,
        module: impl Into<String>,
        component: impl Into<String>,
        distinct_name: impl Into<String>,
        view: impl Into<String>,
    ) -> Self {
        Self {
            app: app.into(),
            module: module.into(),
            component: component.into(),
            distinct_name: distinct_name.into(),
            view: view.into(),
            kind: TargetKind::Stateful,
            session: None,
        }
    }

    /// Create a stateful locator already bound to a session
    pub fn stateful(
        app: impl Into<String>,
        module: impl Into<String>,
        component: impl Into<String>,
        distinct_name: impl Into<String>,
        view: impl Into<String>,
        session: SessionId,
    ) -> Self {
        Self {
            app: app.into(),
            module: module.into(),
            component: component.into(),
            distinct_name: distinct_name.into(),
            view: view.into(),
            kind: TargetKind::Stateful,
            session: Some(session),
        }
    }

    /// Return a new locator bound to the given session
    ///
    /// The receiver is unchanged; a bound session is never swapped in place.
    pub fn for_session(&self, session: SessionId) -> Self {
        let mut bound = self.clone();
        bound.kind = TargetKind::Stateful;
        bound.session = Some(session);
        bound
    }

    /// Return a copy of this locator with no session bound
    pub fn unbound(&self) -> Self {
        let mut unbound = self.clone();
        unbound.session = None;
        unbound
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn distinct_name(&self) -> &str {
        &self.distinct_name
    }

    pub fn view(&self) -> &str {
        &self.view
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    /// True for stateful targets, bound or not
    pub fn is_stateful(&self) -> bool {
        self.kind == TargetKind::Stateful
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}#{}",
            self.app, self.module, self.distinct_name, self.component, self.view
        )?;
        if let Some(session) = &self.session {
            write!(f, "@{}", session)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_locator() -> Locator {
        Locator::stateless("shop-app", "orders", "EchoBean", "", "EchoRemote")
    }

    #[test]
    fn test_locator_equality_over_all_fields() {
        let a = echo_locator();
        let b = Locator::stateless("shop-app", "orders", "EchoBean", "", "EchoRemote");
        assert_eq!(a, b);

        let different_view =
            Locator::stateless("shop-app", "orders", "EchoBean", "", "OtherRemote");
        assert_ne!(a, different_view);

        let different_distinct =
            Locator::stateless("shop-app", "orders", "EchoBean", "node-2", "EchoRemote");
        assert_ne!(a, different_distinct);
    }

    #[test]
    fn test_session_binding_produces_new_value() {
        let unbound =
            Locator::stateful_unbound("shop-app", "orders", "CounterBean", "", "Counter");
        assert!(unbound.session().is_none());
        assert!(unbound.is_stateful());

        let session = SessionId::generate();
        let bound = unbound.for_session(session.clone());

        // original untouched
        assert!(unbound.session().is_none());
        assert_eq!(bound.session(), Some(&session));
        assert_ne!(unbound, bound);
    }

    #[test]
    fn test_bound_and_unbound_round_trip() {
        let session = SessionId::generate();
        let bound =
            Locator::stateful("shop-app", "orders", "CounterBean", "", "Counter", session);
        let unbound = bound.unbound();
        assert!(unbound.session().is_none());
        assert_eq!(unbound.component(), "CounterBean");
    }

    #[test]
    fn test_serializes_for_the_wire() {
        let session = SessionId::generate();
        let bound = Locator::stateful("shop-app", "orders", "CounterBean", "", "Counter", session);
        let bytes = bincode::serialize(&bound).unwrap();
        let decoded: Locator = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, bound);
    }

    #[test]
    fn test_display_includes_session_when_bound() {
        let plain = echo_locator();
        assert_eq!(format!("{}", plain), "shop-app/orders//EchoBean#EchoRemote");

        let session = SessionId::generate();
        let bound = plain.for_session(session.clone());
        assert!(format!("{}", bound).ends_with(&format!("@{}", session)));
    }
}

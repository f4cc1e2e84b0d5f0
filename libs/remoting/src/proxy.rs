//! Proxy Invocation Handler
//!
//! The shared dispatch routine behind every remote handle. A business
//! contract is rendered as a hand-written (or generated) wrapper struct
//! whose methods forward to [`ProxyInvoker::invoke`] or
//! [`ProxyInvoker::invoke_async`]; no runtime code generation is involved.
//! Cloning a `ProxyInvoker` mints a sibling handle for the same target.
//!
//! Dispatch order for one call: context liveness check, stateful session
//! check, pre-dispatch interceptors, receiver selection, correlation id
//! allocation, transmit. Synchronous callers then await under the
//! configured timeout; asynchronous callers get the future back immediately.

use crate::classify::{classify, Classified};
use crate::completion::InvocationFuture;
use crate::connection::{Connection, PendingInvocation};
use crate::context::ClientContext;
use crate::error::{InvocationError, Result};
use crate::interceptor::InterceptorChain;
use crate::selector::select_receiver;
use codec::{RequestFrame, RequestKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use types::{Locator, SessionId, TargetKind};

/// Per-proxy invocation settings
#[derive(Debug, Clone)]
pub struct InvocationConfig {
    /// Wait limit for synchronous invocations
    pub timeout: Duration,
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

/// Remote handle for one locator: every method call maps to one
/// request/response cycle on a selected connection
#[derive(Debug, Clone)]
pub struct ProxyInvoker {
    context: Arc<ClientContext>,
    locator: Locator,
    interceptors: Arc<InterceptorChain>,
    config: InvocationConfig,
}

impl ProxyInvoker {
    /// Create a proxy for the locator with an empty interceptor chain
    pub fn new(context: Arc<ClientContext>, locator: Locator) -> Self {
        Self {
            context,
            locator,
            interceptors: Arc::new(InterceptorChain::new()),
            config: InvocationConfig::default(),
        }
    }

    /// Replace the interceptor chain
    pub fn with_interceptors(mut self, interceptors: InterceptorChain) -> Self {
        self.interceptors = Arc::new(interceptors);
        self
    }

    /// Replace the invocation settings
    pub fn with_config(mut self, config: InvocationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Synchronous invocation: dispatch and await under the configured timeout
    ///
    /// On timeout the pending entry is cancelled locally; a late response is
    /// discarded as unknown and the outcome on the peer stays unknown.
    pub async fn invoke<A, R>(&self, method: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let (connection, pending) = self.dispatch(RequestKind::Invoke, method, args).await?;

        let resolution =
            match tokio::time::timeout(self.config.timeout, pending.cell().wait()).await {
                Ok(resolution) => resolution,
                Err(_) => {
                    connection.cancel(pending.correlation_id());
                    return Err(InvocationError::timeout(
                        format!("invoke {}#{}", self.locator, method),
                        self.config.timeout.as_millis() as u64,
                    ));
                }
            };

        self.interceptors.run_after(&resolution);
        match classify(resolution?)? {
            Classified::Value(payload) => Ok(codec::decode_value(&payload)?),
            other => Err(InvocationError::system(format!(
                "Unexpected non-value outcome for method invocation: {:?}",
                other
            ))),
        }
    }

    /// Asynchronous-return invocation: the returned future resolves on the
    /// connection's completion path, never on the calling task
    ///
    /// The future is cloneable; every clone observes the same single
    /// resolution without re-dispatching.
    pub async fn invoke_async<A, R>(&self, method: &str, args: &A) -> Result<InvocationFuture<R>>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let (_connection, pending) = self.dispatch(RequestKind::Invoke, method, args).await?;
        Ok(InvocationFuture::new(
            Arc::clone(pending.cell()),
            Arc::clone(&self.interceptors),
        ))
    }

    /// Release the server-side session state behind this stateful proxy
    ///
    /// Later invocations through the same proxy resolve to session-expired;
    /// the runtime does not retry or re-create on the caller's behalf.
    pub async fn remove_session(&self) -> Result<()> {
        let (connection, pending) = self
            .dispatch(RequestKind::SessionRemove, "", &())
            .await?;

        let resolution =
            match tokio::time::timeout(self.config.timeout, pending.cell().wait()).await {
                Ok(resolution) => resolution,
                Err(_) => {
                    connection.cancel(pending.correlation_id());
                    return Err(InvocationError::timeout(
                        format!("remove session {}", self.locator),
                        self.config.timeout.as_millis() as u64,
                    ));
                }
            };

        self.interceptors.run_after(&resolution);
        match classify(resolution?)? {
            Classified::SessionRemoved => Ok(()),
            other => Err(InvocationError::system(format!(
                "Unexpected outcome for session removal: {:?}",
                other
            ))),
        }
    }

    /// Shared dispatch routine for every request kind
    async fn dispatch<A>(
        &self,
        kind: RequestKind,
        method: &str,
        args: &A,
    ) -> Result<(Arc<Connection>, PendingInvocation)>
    where
        A: Serialize + ?Sized,
    {
        self.context.ensure_active()?;

        // Stateful targets must carry an issued session before any dispatch
        if self.locator.kind() == TargetKind::Stateful
            && self.locator.session().is_none()
            && kind != RequestKind::SessionOpen
        {
            return Err(InvocationError::usage(format!(
                "Stateful target {} invoked without a session; call create_session first",
                self.locator
            )));
        }

        // The correlation id is assigned only once a receiver is known; the
        // frame is built first so the hooks can inspect and veto it.
        let mut request = match kind {
            RequestKind::Invoke => RequestFrame::invoke(
                0,
                self.locator.clone(),
                method,
                codec::encode_value(args)?,
            ),
            RequestKind::SessionOpen => RequestFrame::session_open(0, self.locator.clone()),
            RequestKind::SessionRemove => RequestFrame::session_remove(0, self.locator.clone()),
        };

        // Hooks run ahead of receiver selection, so a veto leaves no trace in
        // the affinity map and wins over a missing receiver.
        self.interceptors.run_before(&mut request)?;

        let connection = select_receiver(&self.context, &self.locator)?;
        let correlation_id = connection.allocate_correlation_id()?;
        request.correlation_id = correlation_id;

        debug!(
            correlation = correlation_id,
            target = %self.locator,
            method,
            ?kind,
            "Dispatching request"
        );
        let pending = connection.send_request(request).await?;
        Ok((connection, pending))
    }
}

/// Create a stateful session for an unbound stateful locator
///
/// Returns the identifier issued by the peer; bind it with
/// [`Locator::for_session`] before building the stateful proxy.
pub async fn create_session(
    context: &Arc<ClientContext>,
    locator: &Locator,
) -> Result<SessionId> {
    if locator.kind() != TargetKind::Stateful {
        return Err(InvocationError::usage(format!(
            "Session creation requires a stateful target, {} is stateless",
            locator
        )));
    }
    if locator.session().is_some() {
        return Err(InvocationError::usage(format!(
            "Locator {} already carries a session",
            locator
        )));
    }

    let invoker = ProxyInvoker::new(Arc::clone(context), locator.clone());
    let (connection, pending) = invoker.dispatch(RequestKind::SessionOpen, "", &()).await?;

    let resolution =
        match tokio::time::timeout(invoker.config.timeout, pending.cell().wait()).await {
            Ok(resolution) => resolution,
            Err(_) => {
                connection.cancel(pending.correlation_id());
                return Err(InvocationError::timeout(
                    format!("create session for {}", locator),
                    invoker.config.timeout.as_millis() as u64,
                ));
            }
        };

    match classify(resolution?)? {
        Classified::SessionOpened(session) => {
            debug!(target = %locator, session = %session, "Session created");
            Ok(session)
        }
        other => Err(InvocationError::system(format!(
            "Unexpected outcome for session creation: {:?}",
            other
        ))),
    }
}

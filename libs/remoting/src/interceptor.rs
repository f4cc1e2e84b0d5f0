//! Interceptor Chain
//!
//! Ordered pre/post hooks around request dispatch. Hooks run in registration
//! order before dispatch and in reverse order after the response is
//! observed, matching a nested scope discipline. The chain is executed
//! outside every connection lock, so a hook may itself invoke through the
//! runtime without deadlocking the pending table.

use crate::completion::Resolution;
use crate::context::ClientContext;
use crate::error::{InvocationError, Result};
use codec::RequestFrame;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a pre-dispatch hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptorAction {
    /// Proceed to the next hook and then to dispatch
    Continue,
    /// Abort dispatch without contacting the peer
    Veto { reason: String },
}

/// One pluggable dispatch hook
///
/// A hook that returns an error aborts dispatch; the fault is surfaced to
/// the caller as a system exception.
pub trait InvocationInterceptor: Send + Sync {
    /// Inspect or mutate the outgoing request before it is sent
    fn before_dispatch(&self, request: &mut RequestFrame) -> Result<InterceptorAction> {
        let _ = request;
        Ok(InterceptorAction::Continue)
    }

    /// Observe the resolution after the response (or local failure) arrives
    fn after_receipt(&self, resolution: &Resolution) {
        let _ = resolution;
    }
}

/// Ordered, caller-configurable hook chain
#[derive(Default)]
pub struct InterceptorChain {
    hooks: Vec<Arc<dyn InvocationInterceptor>>,
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: Arc<dyn InvocationInterceptor>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run pre-dispatch hooks in registration order
    ///
    /// A veto or hook fault aborts the chain; later hooks do not run.
    pub fn run_before(&self, request: &mut RequestFrame) -> Result<()> {
        for (index, hook) in self.hooks.iter().enumerate() {
            match hook.before_dispatch(request) {
                Ok(InterceptorAction::Continue) => {}
                Ok(InterceptorAction::Veto { reason }) => {
                    debug!(hook = index, reason = %reason, "Dispatch vetoed by interceptor");
                    return Err(InvocationError::usage(format!(
                        "Dispatch vetoed by interceptor: {}",
                        reason
                    )));
                }
                Err(fault) => {
                    warn!(hook = index, error = %fault, "Interceptor hook failed");
                    return Err(InvocationError::system_with_source(
                        "Pre-dispatch interceptor hook failed",
                        &fault,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Run post-receipt hooks in reverse registration order
    pub fn run_after(&self, resolution: &Resolution) {
        for hook in self.hooks.iter().rev() {
            hook.after_receipt(resolution);
        }
    }
}

/// Attaches the context's current transaction token to outgoing requests
///
/// The token is opaque to the runtime; the peer interprets it. Requests sent
/// while no token is bound are left untouched.
pub struct TransactionInterceptor {
    context: Arc<ClientContext>,
}

/// Attachment name under which the transaction token travels
pub const TRANSACTION_ATTACHMENT: &str = "transaction";

impl TransactionInterceptor {
    pub fn new(context: Arc<ClientContext>) -> Self {
        Self { context }
    }
}

impl InvocationInterceptor for TransactionInterceptor {
    fn before_dispatch(&self, request: &mut RequestFrame) -> Result<InterceptorAction> {
        if let Some(token) = self.context.current_transaction() {
            request.attach(TRANSACTION_ATTACHMENT, token.into_bytes());
        }
        Ok(InterceptorAction::Continue)
    }
}

/// Logs every dispatch and its resolution category
#[derive(Debug, Default)]
pub struct TracingInterceptor;

impl InvocationInterceptor for TracingInterceptor {
    fn before_dispatch(&self, request: &mut RequestFrame) -> Result<InterceptorAction> {
        debug!(
            correlation = request.correlation_id,
            target = %request.locator,
            method = %request.method,
            "Dispatching invocation"
        );
        Ok(InterceptorAction::Continue)
    }

    fn after_receipt(&self, resolution: &Resolution) {
        match resolution {
            Ok(outcome) => debug!(?outcome, "Invocation resolved"),
            Err(error) => debug!(category = error.category(), "Invocation failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::ResponseOutcome;
    use parking_lot::Mutex;
    use types::Locator;

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl InvocationInterceptor for Recorder {
        fn before_dispatch(&self, _request: &mut RequestFrame) -> Result<InterceptorAction> {
            self.log.lock().push(format!("before:{}", self.label));
            Ok(InterceptorAction::Continue)
        }

        fn after_receipt(&self, _resolution: &Resolution) {
            self.log.lock().push(format!("after:{}", self.label));
        }
    }

    fn request() -> RequestFrame {
        let locator = Locator::stateless("app", "mod", "EchoBean", "", "EchoRemote");
        RequestFrame::invoke(1, locator, "echo", Vec::new())
    }

    #[test]
    fn test_nested_scope_ordering() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = InterceptorChain::new()
            .with(Arc::new(Recorder {
                label: "one",
                log: Arc::clone(&log),
            }))
            .with(Arc::new(Recorder {
                label: "two",
                log: Arc::clone(&log),
            }));

        let mut req = request();
        chain.run_before(&mut req).unwrap();
        chain.run_after(&Ok(ResponseOutcome::Value(Vec::new())));

        assert_eq!(
            *log.lock(),
            vec!["before:one", "before:two", "after:two", "after:one"]
        );
    }

    #[test]
    fn test_veto_aborts_chain() {
        struct Veto;
        impl InvocationInterceptor for Veto {
            fn before_dispatch(&self, _request: &mut RequestFrame) -> Result<InterceptorAction> {
                Ok(InterceptorAction::Veto {
                    reason: "blocked by policy".to_string(),
                })
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = InterceptorChain::new().with(Arc::new(Veto)).with(Arc::new(Recorder {
            label: "late",
            log: Arc::clone(&log),
        }));

        let err = chain.run_before(&mut request()).unwrap_err();
        assert_eq!(err.category(), "usage");
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_hook_fault_becomes_system_exception() {
        struct Faulty;
        impl InvocationInterceptor for Faulty {
            fn before_dispatch(&self, _request: &mut RequestFrame) -> Result<InterceptorAction> {
                Err(InvocationError::usage("hook exploded"))
            }
        }

        let chain = InterceptorChain::new().with(Arc::new(Faulty));
        let err = chain.run_before(&mut request()).unwrap_err();
        assert_eq!(err.category(), "system");
    }

    #[test]
    fn test_hook_can_mutate_envelope() {
        struct Tagger;
        impl InvocationInterceptor for Tagger {
            fn before_dispatch(&self, request: &mut RequestFrame) -> Result<InterceptorAction> {
                request.attach("trace", vec![0x01]);
                Ok(InterceptorAction::Continue)
            }
        }

        let chain = InterceptorChain::new().with(Arc::new(Tagger));
        let mut req = request();
        chain.run_before(&mut req).unwrap();
        assert!(req.attachments.contains_key("trace"));
    }
}

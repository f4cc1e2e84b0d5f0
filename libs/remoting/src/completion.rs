//! Single-Assignment Completion Cells
//!
//! The bridge between the per-connection reader task and callers waiting on
//! an invocation. A cell resolves exactly once; any number of awaiters
//! observe the same resolution, and awaiting an already-resolved cell
//! returns immediately.

use crate::classify::{classify, Classified};
use crate::error::{InvocationError, Result};
use crate::interceptor::InterceptorChain;
use codec::ResponseOutcome;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Resolution of one in-flight request: the wire outcome, or a failure
/// raised on the client side (teardown, cancellation)
pub type Resolution = std::result::Result<ResponseOutcome, InvocationError>;

/// Single-assignment slot resolved by the connection's completion path
#[derive(Debug)]
pub struct CompletionCell {
    slot: Mutex<Option<Resolution>>,
    notify: Notify,
}

impl CompletionCell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
        })
    }

    /// Resolve the cell; returns false if it was already resolved
    pub fn resolve(&self, resolution: Resolution) -> bool {
        {
            let mut slot = self.slot.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(resolution);
        }
        self.notify.notify_waiters();
        true
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Wait until resolved; resolved cells return immediately
    pub async fn wait(&self) -> Resolution {
        loop {
            // Register for a wakeup before checking, so a resolve between
            // the check and the await is not lost
            let notified = self.notify.notified();
            if let Some(resolution) = self.slot.lock().clone() {
                return resolution;
            }
            notified.await;
        }
    }
}

/// Caller-visible handle for an asynchronous-return invocation
///
/// Cloneable; every clone resolves to the same outcome without
/// re-dispatching. Post-dispatch interceptor hooks run exactly once, on the
/// first awaiter to observe the resolution.
#[derive(Debug, Clone)]
pub struct InvocationFuture<R> {
    cell: Arc<CompletionCell>,
    interceptors: Arc<InterceptorChain>,
    observed: Arc<AtomicBool>,
    _result: PhantomData<fn() -> R>,
}

impl<R: DeserializeOwned> InvocationFuture<R> {
    pub(crate) fn new(cell: Arc<CompletionCell>, interceptors: Arc<InterceptorChain>) -> Self {
        Self {
            cell,
            interceptors,
            observed: Arc::new(AtomicBool::new(false)),
            _result: PhantomData,
        }
    }

    /// Whether the invocation has already resolved
    pub fn is_done(&self) -> bool {
        self.cell.is_resolved()
    }

    /// Await the result, classifying and decoding the wire outcome
    pub async fn value(&self) -> Result<R> {
        let resolution = self.cell.wait().await;
        if self
            .observed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.interceptors.run_after(&resolution);
        }

        match classify(resolution?)? {
            Classified::Value(payload) => Ok(codec::decode_value(&payload)?),
            other => Err(InvocationError::system(format!(
                "Unexpected non-value outcome for method invocation: {:?}",
                other
            ))),
        }
    }
}

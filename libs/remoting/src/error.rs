//! Invocation Error Taxonomy
//!
//! Every invocation resolves to exactly one value or exactly one error from
//! this taxonomy; the runtime never swallows a failure and never re-labels
//! an application fault as infrastructure or vice versa. Callers use
//! [`InvocationError::is_retryable`] to decide whether trying another
//! receiver is safe.

use thiserror::Error;

/// Result type alias for invocation operations
pub type Result<T> = std::result::Result<T, InvocationError>;

/// Classified failure of one remote invocation
///
/// Variants are `Clone` so a shared invocation future can hand the same
/// resolution to every awaiter; wrapped causes are therefore carried as
/// rendered strings rather than boxed source errors.
#[derive(Debug, Clone, Error)]
pub enum InvocationError {
    /// Client-side misuse, fatal to the call (e.g. stateful call without a
    /// session, invocation through a suspended context)
    #[error("Usage error: {message}")]
    Usage { message: String },

    /// No registered connection can serve the target
    #[error("No receiver for target: {message}")]
    NoSuchReceiver { message: String },

    /// The peer was addressed but the component/view/session combination
    /// does not resolve on it
    #[error("No such target: {message}")]
    NoSuchTarget { message: String },

    /// The bound session identifier is unknown to the peer
    #[error("Session expired: {message}")]
    SessionExpired { message: String },

    /// Failure declared by the invoked method's own contract, propagated
    /// verbatim with its encoded payload
    #[error("Application exception of type {type_name}")]
    Application { type_name: String, payload: Vec<u8> },

    /// Infrastructure failure: peer container fault, marshalling fault,
    /// transport breakage, connection teardown
    #[error("System exception: {message}")]
    System {
        message: String,
        cause: Option<String>,
    },

    /// Client-side wait exceeded; the outcome on the peer is unknown
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },
}

impl InvocationError {
    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Create a no-such-receiver error
    pub fn no_such_receiver(message: impl Into<String>) -> Self {
        Self::NoSuchReceiver {
            message: message.into(),
        }
    }

    /// Create a no-such-target error
    pub fn no_such_target(message: impl Into<String>) -> Self {
        Self::NoSuchTarget {
            message: message.into(),
        }
    }

    /// Create a session-expired error
    pub fn session_expired(message: impl Into<String>) -> Self {
        Self::SessionExpired {
            message: message.into(),
        }
    }

    /// Create an application exception carrying the declared failure payload
    pub fn application(type_name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self::Application {
            type_name: type_name.into(),
            payload,
        }
    }

    /// Create a system exception
    pub fn system(message: impl Into<String>) -> Self {
        Self::System {
            message: message.into(),
            cause: None,
        }
    }

    /// Create a system exception preserving the original cause
    pub fn system_with_source(
        message: impl Into<String>,
        source: &(impl std::fmt::Display + ?Sized),
    ) -> Self {
        Self::System {
            message: message.into(),
            cause: Some(source.to_string()),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Whether retrying on another receiver is safe
    ///
    /// Application faults and expired sessions must never be retried by
    /// the runtime; the caller owns that decision.
    pub fn is_retryable(&self) -> bool {
        match self {
            InvocationError::System { .. } => true,
            InvocationError::NoSuchReceiver { .. } => true,
            InvocationError::Timeout { .. } => true,
            InvocationError::Usage { .. } => false,
            InvocationError::NoSuchTarget { .. } => false,
            InvocationError::SessionExpired { .. } => false,
            InvocationError::Application { .. } => false,
        }
    }

    /// Error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            InvocationError::Usage { .. } => "usage",
            InvocationError::NoSuchReceiver { .. } => "no_such_receiver",
            InvocationError::NoSuchTarget { .. } => "no_such_target",
            InvocationError::SessionExpired { .. } => "session_expired",
            InvocationError::Application { .. } => "application",
            InvocationError::System { .. } => "system",
            InvocationError::Timeout { .. } => "timeout",
        }
    }

    /// Decode the declared failure payload of an application exception
    ///
    /// Returns `None` for every other variant.
    pub fn application_payload<E: serde::de::DeserializeOwned>(&self) -> Option<E> {
        match self {
            InvocationError::Application { payload, .. } => {
                codec::decode_value(payload).ok()
            }
            _ => None,
        }
    }
}

/// Wire decode faults are infrastructure failures
impl From<codec::CodecError> for InvocationError {
    fn from(error: codec::CodecError) -> Self {
        InvocationError::system_with_source("Wire codec failure", &error)
    }
}

/// Channel failures at connection establishment: an unresolved peer name
/// means no receiver, everything else is infrastructure
impl From<crate::transport::ChannelError> for InvocationError {
    fn from(error: crate::transport::ChannelError) -> Self {
        use crate::transport::ChannelError;
        match error {
            ChannelError::Unresolved { name, message } => InvocationError::no_such_receiver(
                format!("Peer name '{}' did not resolve: {}", name, message),
            ),
            ChannelError::Timeout {
                operation,
                timeout_ms,
            } => InvocationError::timeout(operation, timeout_ms),
            other => InvocationError::system_with_source("Transport failure", &other),
        }
    }
}

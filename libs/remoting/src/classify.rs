//! Exception Classifier
//!
//! Total mapping from the wire-level outcome union to either a successful
//! classification or one error of the invocation taxonomy. The peer decided
//! whether a failure belongs to the invoked method's declared contract; this
//! mapping preserves that decision and never moves a failure between the
//! application and system classes.

use crate::error::InvocationError;
use codec::ResponseOutcome;
use types::SessionId;

/// Successful outcomes after classification
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// Encoded return value of a business method
    Value(Vec<u8>),
    /// Session created with the issued identifier
    SessionOpened(SessionId),
    /// Session released
    SessionRemoved,
}

/// Classify a wire outcome
pub fn classify(outcome: ResponseOutcome) -> Result<Classified, InvocationError> {
    match outcome {
        ResponseOutcome::Value(payload) => Ok(Classified::Value(payload)),
        ResponseOutcome::SessionOpened(session) => Ok(Classified::SessionOpened(session)),
        ResponseOutcome::SessionRemoved => Ok(Classified::SessionRemoved),
        ResponseOutcome::ApplicationFault { payload, type_name } => {
            Err(InvocationError::application(type_name, payload))
        }
        ResponseOutcome::SystemFault { message, cause } => Err(InvocationError::System {
            message,
            cause,
        }),
        ResponseOutcome::NoSuchReceiver { message } => {
            Err(InvocationError::no_such_receiver(message))
        }
        ResponseOutcome::NoSuchTarget { message } => Err(InvocationError::no_such_target(message)),
        ResponseOutcome::SessionExpired { message } => {
            Err(InvocationError::session_expired(message))
        }
    }
}

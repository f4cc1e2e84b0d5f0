//! Invocation Frame Definitions
//!
//! One request frame maps to exactly one response frame, matched by
//! correlation id on a shared connection. The response outcome is a tagged
//! union so a failure's classification survives the process boundary intact;
//! the client-side classifier maps it to native errors without guessing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use types::{Locator, SessionId};

/// What the client is asking the peer to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    /// Invoke a business method on the addressed view
    Invoke,
    /// Create a stateful session for the addressed component
    SessionOpen,
    /// Release the stateful session bound in the locator
    SessionRemove,
}

/// One outgoing invocation request
///
/// `attachments` carries opaque out-of-band tokens (e.g. a transaction
/// context token added by an interceptor); the runtime never interprets
/// them, the peer may.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub correlation_id: u64,
    pub kind: RequestKind,
    pub locator: Locator,
    /// Business method name; empty for session lifecycle requests
    pub method: String,
    /// Encoded argument payload, empty for zero-argument methods
    pub args: Vec<u8>,
    /// Opaque named attachments added by interceptors
    pub attachments: BTreeMap<String, Vec<u8>>,
}

impl RequestFrame {
    pub fn invoke(
        correlation_id: u64,
        locator: Locator,
        method: impl Into<String>,
        args: Vec<u8>,
    ) -> Self {
        Self {
            correlation_id,
            kind: RequestKind::Invoke,
            locator,
            method: method.into(),
            args,
            attachments: BTreeMap::new(),
        }
    }

    pub fn session_open(correlation_id: u64, locator: Locator) -> Self {
        Self {
            correlation_id,
            kind: RequestKind::SessionOpen,
            locator,
            method: String::new(),
            args: Vec::new(),
            attachments: BTreeMap::new(),
        }
    }

    pub fn session_remove(correlation_id: u64, locator: Locator) -> Self {
        Self {
            correlation_id,
            kind: RequestKind::SessionRemove,
            locator,
            method: String::new(),
            args: Vec::new(),
            attachments: BTreeMap::new(),
        }
    }

    /// Attach an opaque token under the given name
    pub fn attach(&mut self, name: impl Into<String>, token: Vec<u8>) {
        self.attachments.insert(name.into(), token);
    }
}

/// Peer-reported result of one request
///
/// The application/system distinction is decided by the peer and must never
/// be re-interpreted by the client: an `ApplicationFault` is part of the
/// invoked method's declared contract, everything else is infrastructure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseOutcome {
    /// Successful invocation, encoded return value
    Value(Vec<u8>),
    /// Session created; the issued identifier
    SessionOpened(SessionId),
    /// Session released
    SessionRemoved,
    /// Failure declared by the invoked method's own contract
    ApplicationFault {
        /// Encoded failure payload, returned to the caller unmodified
        payload: Vec<u8>,
        /// Peer-side name of the declared failure type
        type_name: String,
    },
    /// Infrastructure failure on the peer (container, marshalling, runtime)
    SystemFault {
        message: String,
        cause: Option<String>,
    },
    /// The addressed component/view is not deployed on the peer
    NoSuchReceiver { message: String },
    /// The component exists but the addressed view/session combination does not
    NoSuchTarget { message: String },
    /// The session identifier is unknown to the peer
    SessionExpired { message: String },
}

/// One incoming response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub correlation_id: u64,
    pub outcome: ResponseOutcome,
}

/// Top-level wire frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    Request(RequestFrame),
    Response(ResponseFrame),
}

impl Frame {
    /// Correlation id regardless of direction
    pub fn correlation_id(&self) -> u64 {
        match self {
            Frame::Request(req) => req.correlation_id,
            Frame::Response(resp) => resp.correlation_id,
        }
    }
}

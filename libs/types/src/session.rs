//! Session Identifiers
//!
//! A `SessionId` is an opaque byte token issued by the remote peer when a
//! stateful session is created. The client never inspects it beyond equality
//! and never fabricates one for a live target; [`SessionId::generate`] exists
//! for peers and test fixtures that play the issuing side.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque server-issued token identifying one stateful session instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId {
    token: Vec<u8>,
}

impl SessionId {
    /// Wrap a token received from the remote peer
    pub fn from_bytes(token: Vec<u8>) -> Self {
        Self { token }
    }

    /// Issue a fresh random token (issuing side only)
    pub fn generate() -> Self {
        Self {
            token: Uuid::new_v4().as_bytes().to_vec(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.token
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.token))
    }
}

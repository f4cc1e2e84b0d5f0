//! Value Types for the Remlink Invocation Runtime
//!
//! This crate contains the pure data layer shared by the codec and the
//! client runtime:
//! - `Locator`: immutable identity of a remote component view
//! - `SessionId`: opaque server-issued stateful session token
//!
//! ## What This Crate Does NOT Contain
//! - Wire encoding rules (belongs in codec)
//! - Connection or dispatch logic (belongs in remoting)

pub mod locator;
pub mod session;

pub use locator::{Locator, TargetKind};
pub use session::SessionId;

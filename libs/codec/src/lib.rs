//! # Remlink Protocol Codec
//!
//! ## Purpose
//!
//! This crate contains the "rules" layer of the Remlink client runtime:
//! - Invocation frame definitions (request/response, tagged outcome union)
//! - Frame encoding/decoding with magic and version validation
//! - Argument and return value payload encoding
//! - Protocol constants and error types
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → libs/remoting
//!     ↑           ↓            ↓
//! Pure Data   Wire Rules   Connections
//! Locator     Frames       Dispatch
//! SessionId   Outcomes     Sockets
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Socket management or connection handling (belongs in remoting)
//! - Raw value type definitions (belongs in libs/types)

pub mod constants;
pub mod error;
pub mod frame;
pub mod wire;

pub use constants::{FRAME_MAGIC, MAX_FRAME_SIZE, PROTOCOL_VERSION};
pub use error::{CodecError, CodecResult};
pub use frame::{Frame, RequestFrame, RequestKind, ResponseFrame, ResponseOutcome};
pub use wire::{decode_frame, decode_value, encode_frame, encode_value};

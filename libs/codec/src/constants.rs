//! Protocol-level constants for the Remlink wire format
//!
//! These values are part of the wire format specification and MUST remain
//! consistent across all implementations for protocol compatibility.

/// Frame magic number
///
/// MUST be the first 4 bytes of every encoded frame.
pub const FRAME_MAGIC: u32 = 0x524C_4E4B; // "RLNK"

/// Current protocol version
///
/// Version 1 supports request/response invocation frames, session
/// open/remove frames and the tagged failure outcome union.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum encoded frame size (16MB)
///
/// Prevents memory exhaustion from malformed length prefixes. Matches the
/// transport-level message size limit.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Size of the frame header preceding the bincode body: magic + version
pub const FRAME_HEADER_SIZE: usize = 5;

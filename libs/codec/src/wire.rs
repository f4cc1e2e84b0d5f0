//! Frame and Payload Encoding
//!
//! Wire layout of one frame: `[magic:4][version:1][bincode body]`. The
//! transport adds its own length prefix; this layer only validates magic,
//! version and size bounds. Argument and return values are encoded
//! separately with [`encode_value`]/[`decode_value`] so the frame body never
//! depends on caller-defined types.

use crate::constants::{FRAME_HEADER_SIZE, FRAME_MAGIC, MAX_FRAME_SIZE, PROTOCOL_VERSION};
use crate::error::{CodecError, CodecResult};
use crate::frame::Frame;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Encode a frame with the protocol header
pub fn encode_frame(frame: &Frame) -> CodecResult<Vec<u8>> {
    let body = bincode::serialize(frame)
        .map_err(|e| CodecError::serialize("frame body", e))?;

    let total = FRAME_HEADER_SIZE + body.len();
    if total > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size: total,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut buffer = Vec::with_capacity(total);
    buffer.extend_from_slice(&FRAME_MAGIC.to_be_bytes());
    buffer.push(PROTOCOL_VERSION);
    buffer.extend_from_slice(&body);
    Ok(buffer)
}

/// Decode a frame, validating magic and version
pub fn decode_frame(data: &[u8]) -> CodecResult<Frame> {
    if data.len() < FRAME_HEADER_SIZE {
        return Err(CodecError::frame_too_small(
            FRAME_HEADER_SIZE,
            data.len(),
            "frame header",
        ));
    }

    if data.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size: data.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let magic = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    if magic != FRAME_MAGIC {
        warn!(expected = FRAME_MAGIC, actual = magic, "Frame magic mismatch");
        return Err(CodecError::InvalidMagic {
            expected: FRAME_MAGIC,
            actual: magic,
        });
    }

    let version = data[4];
    if version != PROTOCOL_VERSION {
        warn!(
            actual = version,
            supported = PROTOCOL_VERSION,
            "Unsupported protocol version"
        );
        return Err(CodecError::UnsupportedVersion {
            actual: version,
            supported: PROTOCOL_VERSION,
        });
    }

    bincode::deserialize(&data[FRAME_HEADER_SIZE..])
        .map_err(|e| CodecError::deserialize("frame body", e))
}

/// Encode an argument or return value payload
pub fn encode_value<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| CodecError::serialize("value payload", e))
}

/// Decode an argument or return value payload into its expected shape
pub fn decode_value<T: DeserializeOwned>(data: &[u8]) -> CodecResult<T> {
    bincode::deserialize(data).map_err(|e| CodecError::deserialize("value payload", e))
}

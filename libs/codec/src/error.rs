//! Protocol-level errors for frame processing
//!
//! Each variant carries enough context to diagnose a malformed frame without
//! re-reading the buffer: expected/actual values and the offset or operation
//! that failed.

use thiserror::Error;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Frame encoding/decoding errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// Buffer is too small to contain the frame header
    #[error("Frame too small: need {need} bytes, got {got} (context: {context})")]
    FrameTooSmall {
        need: usize,
        got: usize,
        context: String,
    },

    /// Frame magic number validation failed
    #[error("Invalid magic number: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic { expected: u32, actual: u32 },

    /// Frame was produced by an incompatible protocol version
    #[error("Unsupported protocol version {actual}, this codec speaks version {supported}")]
    UnsupportedVersion { actual: u8, supported: u8 },

    /// Encoded frame exceeds the protocol size limit
    #[error("Frame too large: {size} bytes exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Bincode serialization of a frame or payload value failed
    #[error("Serialization failed: {context}")]
    Serialize {
        context: String,
        #[source]
        source: bincode::Error,
    },

    /// Bincode deserialization of a frame or payload value failed
    #[error("Deserialization failed: {context}")]
    Deserialize {
        context: String,
        #[source]
        source: bincode::Error,
    },
}

impl CodecError {
    pub fn frame_too_small(need: usize, got: usize, context: impl Into<String>) -> Self {
        Self::FrameTooSmall {
            need,
            got,
            context: context.into(),
        }
    }

    pub fn serialize(context: impl Into<String>, source: bincode::Error) -> Self {
        Self::Serialize {
            context: context.into(),
            source,
        }
    }

    pub fn deserialize(context: impl Into<String>, source: bincode::Error) -> Self {
        Self::Deserialize {
            context: context.into(),
            source,
        }
    }

    /// Error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            CodecError::FrameTooSmall { .. } => "frame_too_small",
            CodecError::InvalidMagic { .. } => "invalid_magic",
            CodecError::UnsupportedVersion { .. } => "unsupported_version",
            CodecError::FrameTooLarge { .. } => "frame_too_large",
            CodecError::Serialize { .. } => "serialize",
            CodecError::Deserialize { .. } => "deserialize",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            CodecError::frame_too_small(5, 2, "header").category(),
            "frame_too_small"
        );
        assert_eq!(
            CodecError::InvalidMagic {
                expected: 1,
                actual: 2
            }
            .category(),
            "invalid_magic"
        );
    }
}

//! Error types for the protocol layer.

/// Errors raised while turning messages into bytes and back.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing an outbound message failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserializing an inbound frame failed (malformed or truncated).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded but breaks a protocol rule, e.g. the first
    /// frame of a connection is not an auth session.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// A payload framing fault: a handler tried to read past the end of an
/// envelope, or found bytes that cannot be what the opcode promises.
///
/// The dispatcher catches these per envelope. They never escape one
/// envelope's processing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// A read needed more bytes than the payload has left.
    #[error("read of {wanted} bytes at position {pos} exceeds payload size {size}")]
    OutOfBounds {
        pos: usize,
        wanted: usize,
        size: usize,
    },

    /// A C-string read hit the end of the payload before its terminator.
    #[error("unterminated string starting at position {pos}")]
    UnterminatedString { pos: usize },

    /// The bytes are present but their content is invalid.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

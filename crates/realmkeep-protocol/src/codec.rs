//! Frame codecs: how envelopes and server messages become bytes.
//!
//! The session layer never touches bytes. The network bridge decodes
//! inbound frames into [`Envelope`](crate::Envelope)s and encodes
//! [`ServerMessage`](crate::ServerMessage)s with whatever [`Codec`] the
//! server was built with.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts values to frame bytes and back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into one frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value cannot be
    /// represented in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes one frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed,
    /// truncated, or not the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] framing everything as JSON.
///
/// Readable in browser devtools and logs, which is what you want while
/// bringing up a client. Behind the `json` feature (on by default).
///
/// ```rust
/// use realmkeep_protocol::{Codec, Envelope, JsonCodec, Opcode};
///
/// let codec = JsonCodec;
/// let mut ping = Envelope::new(Opcode::CMSG_PING);
/// ping.write_u32(12).write_u32(40);
///
/// let bytes = codec.encode(&ping).unwrap();
/// let mut decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded.opcode(), Opcode::CMSG_PING);
/// assert_eq!(decoded.read_u32().unwrap(), 12);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{AuthResult, Envelope, Opcode, ServerMessage};

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<Envelope, _> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_missing_payload_returns_decode_error() {
        let result: Result<Envelope, _> = JsonCodec.decode(br#"{"opcode":1}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_auth_response_carries_queue_position() {
        let msg = ServerMessage::AuthResponse {
            result: AuthResult::WaitQueue,
            queue_position: Some(4),
        };
        let bytes = JsonCodec.encode(&msg).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(r#""queue_position":4"#));
        assert!(text.contains(r#""result":"WaitQueue""#));
    }

    #[test]
    fn test_envelope_frame_keeps_opcode_and_payload() {
        let env = Envelope::with_payload(Opcode(0x1DC), vec![1, 2, 3]);
        let bytes = JsonCodec.encode(&env).unwrap();
        let back: Envelope = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(back, env);
    }
}

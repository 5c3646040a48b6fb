//! Codec trait and implementations for payload bodies.
//!
//! The envelope header has a fixed binary layout, but the body that
//! follows it is whatever the payload type serializes to. The dispatch
//! layer doesn't care HOW bodies are serialized; it just needs
//! something that implements the [`Codec`] trait.
//!
//! Currently we provide [`JsonCodec`] (human-readable, great for
//! debugging a relay chain by dumping frames).

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode payload bodies to bytes and decode them back.
///
/// `Send + Sync + 'static` because the codec lives inside the dispatcher,
/// which a runtime moves into its dispatch task.
///
/// `DeserializeOwned` (vs plain `Deserialize`) means decoded values own
/// their data, so the inbound buffer can be dropped (or relayed) right
/// after decoding.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// This is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use hopwire_protocol::{Codec, JsonCodec};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Chat {
///     text: String,
/// }
///
/// let codec = JsonCodec;
/// let chat = Chat { text: "gg".into() };
///
/// let bytes = codec.encode(&chat).unwrap();
/// let decoded: Chat = codec.decode(&bytes).unwrap();
/// assert_eq!(chat, decoded);
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
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Damage {
        target: u32,
        amount: f32,
    }

    #[test]
    fn test_json_codec_body_is_plain_json() {
        let bytes = JsonCodec
            .encode(&Damage {
                target: 3,
                amount: 12.5,
            })
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["target"], 3);
        assert_eq!(json["amount"], 12.5);
    }

    #[test]
    fn test_json_codec_decode_garbage_is_decode_error() {
        let result: Result<Damage, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_decode_wrong_shape_is_decode_error() {
        let result: Result<Damage, _> = JsonCodec.decode(br#"{"name": "hello"}"#);
        assert!(result.is_err());
    }
}

//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding envelopes.
///
/// A `ProtocolError` always means the bytes themselves were wrong (or
/// could not be produced). Routing problems live in the dispatch layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing a payload body failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserializing a payload body failed.
    ///
    /// Common causes: the peer runs a different version of the payload
    /// type, or the body was cut short.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The buffer ended before a complete header could be read.
    #[error("truncated envelope: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// The destination byte had bits outside the Clients/Server mask.
    #[error("invalid destination bitmask {0:#04x}")]
    InvalidDestination(u8),
}

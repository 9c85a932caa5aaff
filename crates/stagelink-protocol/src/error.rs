//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
///
/// Encoding and decoding are the only fallible operations here; anything
/// that decodes but carries an unexpected payload is the concern of the
/// layer that registered the handler, not of the protocol.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an event into a frame).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning a frame into an event).
    ///
    /// Common causes: malformed JSON, missing required fields,
    /// wrong data types, or truncated frames.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}

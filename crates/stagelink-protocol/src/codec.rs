//! Codec trait and implementations for serializing/deserializing events.
//!
//! The protocol layer doesn't care how events become frames — it just
//! needs something that implements the [`Codec`] trait. The backoffice
//! speaks JSON, so [`JsonCodec`] is the only implementation today; a
//! binary codec could slot in without touching any other layer.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode events to frames and decode frames back.
///
/// `Send + Sync + 'static` because the codec lives inside the client's
/// long-running supervisor task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes an event into a frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes a frame back into an event.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the frame is malformed,
    /// incomplete, or doesn't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// JSON frames are what the backoffice emits and expects; they also make
/// every exchange inspectable in logs during commissioning.
///
/// ## Example
///
/// ```rust
/// use stagelink_protocol::{Codec, ClientEvent, JsonCodec};
///
/// let codec = JsonCodec;
///
/// let event = ClientEvent::RegisterAudioPlayer {};
/// let frame = codec.encode(&event).unwrap();
///
/// let decoded: ClientEvent = codec.decode(&frame).unwrap();
/// assert_eq!(event, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

//! Codec trait and implementations for serializing/deserializing documents.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The file-backed store persists its whole key/value map through a
//! [`Codec`], so the on-disk format can be swapped without touching the
//! store itself.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because stores holding a codec are shared
/// between the session manager's tasks.
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
/// Encodes with pretty formatting so a session file can be read (and, in a
/// pinch, edited) by hand.
///
/// ## Example
///
/// ```rust
/// use std::collections::BTreeMap;
/// use tokenward_protocol::{Codec, JsonCodec};
///
/// let mut doc = BTreeMap::new();
/// doc.insert("tokenward.userId".to_string(), "u1".to_string());
///
/// let bytes = JsonCodec.encode(&doc).unwrap();
/// let decoded: BTreeMap<String, String> = JsonCodec.decode(&bytes).unwrap();
/// assert_eq!(doc, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec_pretty(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

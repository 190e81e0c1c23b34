//! Error types for the protocol layer.
//!
//! Each crate in Tokenward defines its own error enum. A `ProtocolError`
//! always means "the bytes or JSON did not have the shape we expected",
//! never a network or storage problem.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes or a JSON value into a
    /// Rust type).
    ///
    /// Common causes: a login method that returned something other than
    /// `{ id, token, tokenExpires }`, or a corrupted storage document.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The value parsed but violates protocol rules, e.g. a login result
    /// with an empty token.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

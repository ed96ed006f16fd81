//! Error types for the protocol layer.
//!
//! Each crate in Duelforge defines its own error enum. A `ProtocolError`
//! always means a frame could not be turned into (or out of) a typed
//! event; it never describes a game-level rejection.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, an unknown event `type`, missing
    /// fields, or a session id that fails validation.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message is well-formed but violates a protocol rule,
    /// e.g. an empty session id.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

//! Unified error type for the Duelforge server.

use duelforge_protocol::ProtocolError;
use duelforge_transport::TransportError;

/// Errors that end a connection or stop the server.
///
/// Client-facing rejections (`SessionError`) never show up here: they are
/// answered on the wire and the connection carries on. The `#[from]`
/// attribute on each variant lets `?` convert sub-crate errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum DuelforgeError {
    /// Binding, accepting, sending or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

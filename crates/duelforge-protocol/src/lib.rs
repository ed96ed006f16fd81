//! Wire protocol for Duelforge.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`Snapshot`],
//!   [`Envelope`], [`SessionId`], [`Role`]): the structures that travel
//!   on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those structures
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong doing so.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope<ClientEvent>) → Session coordinator
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use duelforge_transport::ConnectionId;
pub use error::ProtocolError;
pub use types::{
    ClientEvent, Envelope, ParticipantInfo, RejectReason, Role, ServerEvent, SessionId,
    Snapshot,
};

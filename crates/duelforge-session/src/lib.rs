//! Session coordination for Duelforge.
//!
//! Pairs two connections into a session, enforces turn order, and keeps
//! both sides in sync with the one authoritative game state.
//!
//! Each session runs as an isolated Tokio task (actor model). The actor
//! owns the [`Session`] and is the only place it is ever mutated, so
//! every join, transition and departure against one session is handled
//! strictly one at a time while different sessions run independently.
//!
//! # Key types
//!
//! - [`RulesEngine`]: the game rules, consumed as an opaque capability
//! - [`Coordinator`]: handles client events and disconnects
//! - [`SessionRegistry`]: creates, finds and removes sessions
//! - [`SessionHandle`]: send commands to a running session actor
//! - [`Session`]: the data model: participants, roles, turn holder

mod actor;
mod config;
mod coordinator;
mod error;
mod registry;
mod rules;
mod session;

pub use actor::{Departure, Outbox, Peer, SessionHandle, SessionInfo};
pub use config::{MAX_PARTICIPANTS, SessionConfig, SessionPhase};
pub use coordinator::Coordinator;
pub use error::SessionError;
pub use registry::SessionRegistry;
pub use rules::{RulesEngine, RulesError, Verdict};
pub use session::{Admission, Participant, Session};

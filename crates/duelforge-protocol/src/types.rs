//! Core protocol types for Duelforge's wire format.
//!
//! Everything in this module travels "on the wire": clients send
//! [`ClientEvent`]s, the server answers with [`ServerEvent`]s, and both
//! directions wrap them in an [`Envelope`].
//!
//! Game-specific data stays generic. The action a client proposes, the
//! arguments of a query, and the targets a query returns are type
//! parameters chosen by the rules engine; the board itself only ever
//! appears in its engine-serialized `String` form.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A caller-chosen identifier for a session (one paired game).
///
/// Clients make these up themselves and share them out of band, so the
/// server only checks that the id is usable as a key: not blank and not
/// absurdly long. The value is otherwise opaque and kept verbatim.
///
/// `#[serde(try_from = "String")]` routes deserialization through
/// [`SessionId::new`], so a frame carrying an empty id fails to decode
/// instead of creating a session under `""`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Longest accepted id, in bytes.
    pub const MAX_LEN: usize = 64;

    /// Validates and wraps a session id.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] if the id is empty,
    /// whitespace-only, or longer than [`MAX_LEN`](Self::MAX_LEN).
    pub fn new(id: impl Into<String>) -> Result<Self, ProtocolError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "session id must not be empty".into(),
            ));
        }
        if id.len() > Self::MAX_LEN {
            return Err(ProtocolError::InvalidMessage(format!(
                "session id longer than {} bytes",
                Self::MAX_LEN
            )));
        }
        Ok(Self(id))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the two seats in a session.
///
/// The first connection to join a session gets [`Role::First`], the
/// second gets [`Role::Second`]. `First` also moves first, which is why it
/// is the `Default`.
///
/// `#[serde(rename_all = "lowercase")]` puts `"first"` / `"second"` on
/// the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    First,
    Second,
}

impl Role {
    /// Returns the opposing role.
    pub fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Second => write!(f, "second"),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A participant as other clients see it.
///
/// `label` is derived from the connection id (`"conn-7"`); the raw
/// connection handle never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub label: String,
    pub role: Role,
}

/// The full, authoritative view of one session.
///
/// Broadcast whenever the participant list changes (join or departure) so
/// both sides can rebuild their local view from scratch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Engine-serialized game state (e.g. a FEN string for chess).
    pub state: String,
    /// Participants in join order.
    pub participants: Vec<ParticipantInfo>,
    /// The role currently allowed to propose a transition.
    pub turn_holder: Role,
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Why a request was turned down.
///
/// Every rejection goes only to the connection that made the request and
/// leaves the session untouched. Clients can switch on this code without
/// parsing the accompanying human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// No session exists under the requested id.
    UnknownSession,
    /// The session already has two participants.
    RoomFull,
    /// The requester is not a participant of the session.
    NotAParticipant,
    /// The requester's role does not hold the turn.
    NotYourTurn,
    /// The rules engine refused the action (or failed evaluating it).
    InvalidAction,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnknownSession => "UnknownSession",
            Self::RoomFull => "RoomFull",
            Self::NotAParticipant => "NotAParticipant",
            Self::NotYourTurn => "NotYourTurn",
            Self::InvalidAction => "InvalidAction",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events a client sends to the server.
///
/// `A` is the rules engine's action type, `Q` its query type.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON:
///   `{ "type": "Join", "session_id": "R1" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent<A, Q> {
    /// "Seat me in this session, creating it if needed."
    Join { session_id: SessionId },

    /// "Apply this action to the session's state."
    ProposeTransition { session_id: SessionId, action: A },

    /// "What are my options?" A read-only question answered to the
    /// requester alone.
    Query { session_id: SessionId, args: Q },
}

impl<A, Q> ClientEvent<A, Q> {
    /// The session this event is addressed to.
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Join { session_id }
            | Self::ProposeTransition { session_id, .. }
            | Self::Query { session_id, .. } => session_id,
        }
    }

    /// Short name of the event kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::ProposeTransition { .. } => "propose_transition",
            Self::Query { .. } => "query",
        }
    }
}

/// Events the server sends to clients.
///
/// `T` is the rules engine's query target type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent<T> {
    /// Unicast to a joiner: the seat it got.
    RoleAssigned { role: Role },

    /// Broadcast after a join or a departure.
    SessionSnapshot(Snapshot),

    /// Broadcast after an accepted transition.
    TransitionApplied { state: String, turn_holder: Role },

    /// Broadcast right after the transition that ended the game.
    SessionEnded { summary: String },

    /// Unicast answer to a [`ClientEvent::Query`].
    QueryResult { targets: Vec<T> },

    /// Unicast: the request was refused. Nothing changed.
    Rejected { reason: RejectReason, message: String },

    /// Unicast: the frame itself could not be understood.
    /// `code` follows HTTP conventions (400 = bad request).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Envelope: the top-level wire format
// ---------------------------------------------------------------------------

/// The top-level frame wrapper. Every message on the wire is an Envelope.
///
/// ```text
/// ┌──────────────────────────────────────┐
/// │ seq: 42                              │  ← per-connection ordering
/// │ timestamp: 15000                     │  ← ms since connection start
/// │ ┌──────────────────────────────────┐ │
/// │ │ payload: ClientEvent/ServerEvent │ │
/// │ └──────────────────────────────────┘ │
/// └──────────────────────────────────────┘
/// ```
///
/// The server numbers its own frames; clients may omit both counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<P> {
    /// Sequence number, assigned by the sending side.
    #[serde(default)]
    pub seq: u64,

    /// Milliseconds since the connection was accepted.
    #[serde(default)]
    pub timestamp: u64,

    /// The event being carried.
    pub payload: P,
}

// =========================================================================
// Tests
// =========================================================================

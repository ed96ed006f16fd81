//! The session data model: one game's authoritative state.
//!
//! `Session` is plain data plus the invariant-keeping mutations. It does
//! no I/O and knows nothing about channels; the actor in `actor.rs` owns
//! one and decides who hears about each change.

use duelforge_protocol::{ConnectionId, ParticipantInfo, Role, SessionId, Snapshot};

use crate::{MAX_PARTICIPANTS, SessionError, SessionPhase};

/// A seated connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participant {
    pub connection: ConnectionId,
    pub role: Role,
}

/// Result of seating a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The connection took a free seat.
    Seated(Role),
    /// The connection was already seated; nothing changed.
    AlreadySeated(Role),
}

impl Admission {
    /// The role the connection holds after admission.
    pub fn role(self) -> Role {
        match self {
            Self::Seated(role) | Self::AlreadySeated(role) => role,
        }
    }
}

/// One paired game.
///
/// Invariants upheld by every method:
/// - at most [`MAX_PARTICIPANTS`] participants, in join order;
/// - no two participants share a role or a connection;
/// - `turn_holder` only changes through [`advance`](Self::advance).
#[derive(Debug)]
pub struct Session<S> {
    id: SessionId,
    state: S,
    participants: Vec<Participant>,
    turn_holder: Role,
    outcome: Option<String>,
}

impl<S> Session<S> {
    /// Creates an empty session at the engine's start state. The first
    /// role holds the turn.
    pub fn new(id: SessionId, initial_state: S) -> Self {
        Self {
            id,
            state: initial_state,
            participants: Vec::with_capacity(MAX_PARTICIPANTS),
            turn_holder: Role::First,
            outcome: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn turn_holder(&self) -> Role {
        self.turn_holder
    }

    /// The terminal summary, once the engine has declared one.
    pub fn outcome(&self) -> Option<&str> {
        self.outcome.as_deref()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.outcome.is_some() {
            SessionPhase::Ended
        } else if self.participants.len() < MAX_PARTICIPANTS {
            SessionPhase::AwaitingOpponent
        } else {
            SessionPhase::InProgress
        }
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// The role held by `connection`, if it is seated here.
    pub fn role_of(&self, connection: ConnectionId) -> Option<Role> {
        self.participants
            .iter()
            .find(|p| p.connection == connection)
            .map(|p| p.role)
    }

    /// Seats `connection`.
    ///
    /// The first joiner gets [`Role::First`]. Any later joiner gets the
    /// role nobody holds, so if the first participant has left, a
    /// newcomer takes over the vacated first seat rather than doubling
    /// up on the second. Re-joining from an already seated connection is
    /// idempotent.
    ///
    /// # Errors
    /// Returns [`SessionError::RoomFull`] if both seats are taken by
    /// other connections.
    pub fn admit(&mut self, connection: ConnectionId) -> Result<Admission, SessionError> {
        if let Some(role) = self.role_of(connection) {
            return Ok(Admission::AlreadySeated(role));
        }
        if self.participants.len() >= MAX_PARTICIPANTS {
            return Err(SessionError::RoomFull(self.id.clone()));
        }

        let role = match self.participants.first() {
            None => Role::First,
            Some(seated) => seated.role.other(),
        };
        self.participants.push(Participant { connection, role });
        Ok(Admission::Seated(role))
    }

    /// Unseats `connection`. Returns `false` if it was not seated.
    /// Role and turn holder of the remaining participant are unchanged.
    pub fn remove(&mut self, connection: ConnectionId) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p.connection != connection);
        self.participants.len() != before
    }

    /// Checks that `connection` may propose a transition right now and
    /// returns its role.
    ///
    /// # Errors
    /// - [`SessionError::NotAParticipant`] if it is not seated;
    /// - [`SessionError::InvalidAction`] if the game has ended;
    /// - [`SessionError::NotYourTurn`] if its role does not hold the turn.
    pub fn check_turn(&self, connection: ConnectionId) -> Result<Role, SessionError> {
        let role = self
            .role_of(connection)
            .ok_or_else(|| SessionError::NotAParticipant {
                connection,
                session_id: self.id.clone(),
            })?;
        if let Some(outcome) = &self.outcome {
            return Err(SessionError::InvalidAction(format!("game is over: {outcome}")));
        }
        if role != self.turn_holder {
            return Err(SessionError::NotYourTurn {
                role,
                turn_holder: self.turn_holder,
            });
        }
        Ok(role)
    }

    /// Installs the engine's new state after an accepted transition and
    /// passes the turn. Returns the new turn holder.
    pub fn advance(&mut self, state: S, outcome: Option<String>) -> Role {
        self.state = state;
        self.turn_holder = self.turn_holder.other();
        if outcome.is_some() {
            self.outcome = outcome;
        }
        self.turn_holder
    }

    /// Builds the broadcast view of this session. `state` is the
    /// engine-serialized form of [`state()`](Self::state).
    pub fn snapshot(&self, state: String) -> Snapshot {
        Snapshot {
            state,
            participants: self
                .participants
                .iter()
                .map(|p| ParticipantInfo {
                    label: p.connection.to_string(),
                    role: p.role,
                })
                .collect(),
            turn_holder: self.turn_holder,
        }
    }
}

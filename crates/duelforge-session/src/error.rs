//! Error types for the session layer.

use duelforge_protocol::{ConnectionId, RejectReason, Role, ServerEvent, SessionId};

/// Errors that can occur while handling a client event.
///
/// Every variant except `Unavailable` is an expected, client-facing
/// outcome: it is reported to the requesting connection only and leaves
/// the session untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No session exists under this id.
    #[error("session {0} not found")]
    UnknownSession(SessionId),

    /// Both seats are taken.
    #[error("session {0} is full")]
    RoomFull(SessionId),

    /// The connection is not seated in this session.
    #[error("{connection} is not a participant of session {session_id}")]
    NotAParticipant {
        connection: ConnectionId,
        session_id: SessionId,
    },

    /// The requester's role does not hold the turn.
    #[error("not your turn: {turn_holder} is to move, you are {role}")]
    NotYourTurn { role: Role, turn_holder: Role },

    /// The rules engine refused the action or failed evaluating it.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// The session actor stopped before it could answer. Seen when a
    /// request races with the session being retired.
    #[error("session {0} is unavailable")]
    Unavailable(SessionId),
}

impl SessionError {
    /// The wire-level code for this error.
    ///
    /// A retired session looks exactly like a missing one to clients.
    pub fn reason(&self) -> RejectReason {
        match self {
            Self::UnknownSession(_) | Self::Unavailable(_) => RejectReason::UnknownSession,
            Self::RoomFull(_) => RejectReason::RoomFull,
            Self::NotAParticipant { .. } => RejectReason::NotAParticipant,
            Self::NotYourTurn { .. } => RejectReason::NotYourTurn,
            Self::InvalidAction(_) => RejectReason::InvalidAction,
        }
    }

    /// Builds the `Rejected` event sent back to the requester.
    pub fn to_event<T>(&self) -> ServerEvent<T> {
        ServerEvent::Rejected {
            reason: self.reason(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid() -> SessionId {
        SessionId::new("R1").unwrap()
    }

    #[test]
    fn test_reason_mapping() {
        assert_eq!(
            SessionError::RoomFull(sid()).reason(),
            RejectReason::RoomFull
        );
        assert_eq!(
            SessionError::InvalidAction("no".into()).reason(),
            RejectReason::InvalidAction
        );
        assert_eq!(
            SessionError::NotYourTurn {
                role: Role::Second,
                turn_holder: Role::First
            }
            .reason(),
            RejectReason::NotYourTurn
        );
    }

    #[test]
    fn test_unavailable_surfaces_as_unknown_session() {
        assert_eq!(
            SessionError::Unavailable(sid()).reason(),
            RejectReason::UnknownSession
        );
    }

    #[test]
    fn test_to_event_carries_reason_and_message() {
        let err = SessionError::NotAParticipant {
            connection: ConnectionId::new(9),
            session_id: sid(),
        };
        match err.to_event::<()>() {
            ServerEvent::Rejected { reason, message } => {
                assert_eq!(reason, RejectReason::NotAParticipant);
                assert!(message.contains("conn-9"));
                assert!(message.contains("R1"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }
}

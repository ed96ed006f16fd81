//! Session configuration and phase.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Seats per session. Fixed: a session is a duel.
pub const MAX_PARTICIPANTS: usize = 2;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Tunables for session actors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Capacity of each session's command channel. When it fills up,
    /// callers wait (backpressure) rather than queueing without bound.
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { command_buffer: 64 }
    }
}

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

/// Where a session is in its life, derived from its participants and
/// whether the rules engine has declared an outcome.
///
/// ```text
/// AwaitingOpponent ⇄ InProgress → Ended
/// ```
///
/// - **AwaitingOpponent**: one seat taken. Turns are still accepted.
/// - **InProgress**: both seats taken.
/// - **Ended**: the engine reported a terminal condition. The session
///   stays around so both sides see the result, but no further
///   transitions are accepted.
///
/// There is no "empty" phase: a session whose last participant leaves is
/// deleted on the spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    AwaitingOpponent,
    InProgress,
    Ended,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingOpponent => write!(f, "AwaitingOpponent"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}

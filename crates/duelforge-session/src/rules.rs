//! The `RulesEngine` trait: the extension point for game developers.
//!
//! The coordinator never looks inside a game. It asks the engine for a
//! starting position, hands it proposed actions, and forwards whatever
//! serialized state comes back. Everything about legality lives here.

use serde::{Serialize, de::DeserializeOwned};

/// The engine's answer to a proposed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<S> {
    /// The action is legal. `state` replaces the session's state; a
    /// `Some` outcome means the game is over and carries a summary such
    /// as "Black wins by checkmate!".
    Accepted { state: S, outcome: Option<String> },

    /// The action is illegal in the current state.
    Rejected { reason: String },
}

impl<S> Verdict<S> {
    /// Shorthand for an accepted, non-terminal transition.
    pub fn accept(state: S) -> Self {
        Self::Accepted {
            state,
            outcome: None,
        }
    }

    /// Shorthand for an accepted transition that ends the game.
    pub fn finish(state: S, summary: impl Into<String>) -> Self {
        Self::Accepted {
            state,
            outcome: Some(summary.into()),
        }
    }

    /// Shorthand for a rejection.
    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// An unexpected failure inside the engine, e.g. an action the engine
/// could not even interpret. The coordinator reports it to the client as
/// an invalid action; it never takes the session down.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rules engine failure: {0}")]
pub struct RulesError(pub String);

/// The game rules, as the coordinator consumes them.
///
/// Implementations are stateless across calls: every piece of session
/// data is passed in explicitly, so one engine instance serves every
/// session on the server.
///
/// Associated types:
/// - `State`: the full game state (board, side to move, ...)
/// - `Action`: what a client proposes (a move)
/// - `Query`: the argument of a read-only question ("from this square?")
/// - `Target`: one element of the answer ("you can go here")
pub trait RulesEngine: Send + Sync + 'static {
    type State: Send + 'static;
    type Action: Send + Serialize + DeserializeOwned + 'static;
    type Query: Send + Serialize + DeserializeOwned + 'static;
    type Target: Send + Sync + Clone + Serialize + DeserializeOwned + 'static;

    /// The state a new session starts from.
    fn initial_state(&self) -> Self::State;

    /// Evaluates `action` against `state` without mutating it.
    ///
    /// # Errors
    /// Returns [`RulesError`] when evaluation itself fails. Illegal but
    /// well-understood actions should be a [`Verdict::Rejected`] instead.
    fn apply(
        &self,
        state: &Self::State,
        action: &Self::Action,
    ) -> Result<Verdict<Self::State>, RulesError>;

    /// Lists the legal targets for `query` in `state`. An unusable query
    /// yields an empty list.
    fn legal_targets(&self, state: &Self::State, query: &Self::Query) -> Vec<Self::Target>;

    /// Serializes `state` for clients.
    fn encode_state(&self, state: &Self::State) -> String;
}

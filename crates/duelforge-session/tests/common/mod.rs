//! Shared fixtures: a scripted rules engine and peer helpers.

#![allow(dead_code)]

use duelforge_protocol::{ConnectionId, ServerEvent, SessionId};
use duelforge_session::{
    Coordinator, Peer, RulesEngine, RulesError, SessionConfig, SessionRegistry, Verdict,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A rules engine whose every decision is chosen by the test.
///
/// State is the number of accepted moves. `Unprintable` jumps to a state
/// the engine then fails to serialize.
#[derive(Debug)]
pub struct ScriptedEngine;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Script {
    Legal,
    Illegal,
    Win,
    Fault,
    Panic,
    Unprintable,
}

const UNPRINTABLE: u32 = 1000;

impl RulesEngine for ScriptedEngine {
    type State = u32;
    type Action = Script;
    type Query = u32;
    type Target = u32;

    fn initial_state(&self) -> u32 {
        0
    }

    fn apply(&self, state: &u32, action: &Script) -> Result<Verdict<u32>, RulesError> {
        match action {
            Script::Legal => Ok(Verdict::accept(state + 1)),
            Script::Illegal => Ok(Verdict::reject("illegal move")),
            Script::Win => Ok(Verdict::finish(state + 1, "first wins")),
            Script::Fault => Err(RulesError("cannot read move".into())),
            Script::Panic => panic!("scripted engine panic"),
            Script::Unprintable => Ok(Verdict::accept(UNPRINTABLE)),
        }
    }

    /// Returns `count` targets starting at the current state. 99 panics.
    fn legal_targets(&self, state: &u32, count: &u32) -> Vec<u32> {
        if *count == 99 {
            panic!("scripted query panic");
        }
        (0..*count).map(|i| state + i).collect()
    }

    fn encode_state(&self, state: &u32) -> String {
        if *state == UNPRINTABLE {
            panic!("scripted encode panic");
        }
        format!("moves={state}")
    }
}

pub fn coordinator() -> Coordinator<ScriptedEngine> {
    Coordinator::new(SessionRegistry::new(
        ScriptedEngine,
        SessionConfig::default(),
    ))
}

pub fn sid(id: &str) -> SessionId {
    SessionId::new(id).unwrap()
}

pub type Inbox = mpsc::UnboundedReceiver<ServerEvent<u32>>;

/// A peer plus the receiving end of its outbox.
pub fn peer(id: u64) -> (Peer<u32>, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Peer::new(ConnectionId::new(id), tx), rx)
}

/// Everything queued for a peer so far.
pub fn drain(inbox: &mut Inbox) -> Vec<ServerEvent<u32>> {
    let mut events = Vec::new();
    while let Ok(event) = inbox.try_recv() {
        events.push(event);
    }
    events
}

//! Session actor: an isolated Tokio task that owns one [`Session`].
//!
//! Each session runs in its own task, communicating with the outside world
//! through an mpsc channel. Commands are handled strictly one at a time,
//! and each handler does read, validate, mutate and broadcast before the
//! next command is looked at. That is the whole per-session locking story.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use duelforge_protocol::{ConnectionId, Role, ServerEvent, SessionId};
use tokio::sync::{Notify, mpsc, oneshot};

use crate::registry::{self, SessionMap};
use crate::{Admission, Participant, RulesEngine, Session, SessionError, SessionPhase, Verdict};

/// Channel delivering server events to one connection's writer.
pub type Outbox<T> = mpsc::UnboundedSender<ServerEvent<T>>;

/// A connection as the session layer sees it: who it is and where its
/// outbound events go.
#[derive(Debug)]
pub struct Peer<T> {
    id: ConnectionId,
    outbox: Outbox<T>,
}

impl<T> Clone for Peer<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            outbox: self.outbox.clone(),
        }
    }
}

impl<T> Peer<T> {
    pub fn new(id: ConnectionId, outbox: Outbox<T>) -> Self {
        Self { id, outbox }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues an event for this connection. Returns `false` if the
    /// connection's writer is gone; its departure is on the way.
    pub fn send(&self, event: ServerEvent<T>) -> bool {
        self.outbox.send(event).is_ok()
    }
}

/// What a departure did to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The connection was not seated here.
    NotPresent,
    /// The connection left; `remaining` participants were sent a fresh
    /// snapshot.
    Left { remaining: usize },
    /// The last participant left and the session was deleted.
    Closed,
}

/// A point-in-time view of a session, for inspection and tests.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub phase: SessionPhase,
    pub participants: Vec<Participant>,
    pub turn_holder: Role,
    /// Engine-serialized state.
    pub state: String,
    pub outcome: Option<String>,
}

/// Commands sent to a session actor through its channel.
///
/// Every variant carries a `oneshot` reply channel: the caller sends the
/// command and waits for the answer, so a returned `Ok` means the
/// mutation and its broadcasts have already happened.
pub(crate) enum SessionCommand<R: RulesEngine> {
    Join {
        peer: Peer<R::Target>,
        reply: oneshot::Sender<Result<Role, SessionError>>,
    },
    Propose {
        connection: ConnectionId,
        action: R::Action,
        reply: oneshot::Sender<Result<Role, SessionError>>,
    },
    Query {
        args: R::Query,
        reply: oneshot::Sender<Vec<R::Target>>,
    },
    Depart {
        connection: ConnectionId,
        reply: oneshot::Sender<Departure>,
    },
    Inspect {
        reply: oneshot::Sender<SessionInfo>,
    },
}

/// Handle to a running session actor. Used to send commands to it.
///
/// Cheap to clone. The registry holds one per live session and hands out
/// clones; a clone outliving the session just gets `Unavailable` back.
pub struct SessionHandle<R: RulesEngine> {
    session_id: SessionId,
    instance: u64,
    sender: mpsc::Sender<SessionCommand<R>>,
    shutdown: Arc<Notify>,
}

impl<R: RulesEngine> Clone for SessionHandle<R> {
    fn clone(&self) -> Self {
        Self {
            session_id: self.session_id.clone(),
            instance: self.instance,
            sender: self.sender.clone(),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

impl<R: RulesEngine> SessionHandle<R> {
    /// Returns the session's id.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Distinguishes this actor from a later one created under the same
    /// id.
    pub(crate) fn instance(&self) -> u64 {
        self.instance
    }

    /// Seats the peer and returns its role.
    pub async fn join(&self, peer: Peer<R::Target>) -> Result<Role, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Join { peer, reply }, rx).await?
    }

    /// Proposes a transition on behalf of `connection`. On success
    /// returns the new turn holder.
    pub async fn propose(
        &self,
        connection: ConnectionId,
        action: R::Action,
    ) -> Result<Role, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            SessionCommand::Propose {
                connection,
                action,
                reply,
            },
            rx,
        )
        .await?
    }

    /// Asks the engine for legal targets against the current state.
    pub async fn query(&self, args: R::Query) -> Result<Vec<R::Target>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Query { args, reply }, rx).await
    }

    /// Unseats `connection`.
    ///
    /// # Errors
    /// [`SessionError::Unavailable`] if the actor has already stopped.
    pub async fn depart(&self, connection: ConnectionId) -> Result<Departure, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Depart { connection, reply }, rx).await
    }

    /// Requests a snapshot of the session's bookkeeping.
    pub async fn info(&self) -> Result<SessionInfo, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Inspect { reply }, rx).await
    }

    /// Tells the actor to stop after the command it is handling.
    pub(crate) fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    async fn request<T>(
        &self,
        cmd: SessionCommand<R>,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, SessionError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| SessionError::Unavailable(self.session_id.clone()))?;
        rx.await
            .map_err(|_| SessionError::Unavailable(self.session_id.clone()))
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct SessionActor<R: RulesEngine> {
    session: Session<R::State>,
    /// `session.state()` as the engine serialized it, refreshed on every
    /// accepted transition.
    encoded: String,
    instance: u64,
    engine: Arc<R>,
    /// Per-participant outbound channels.
    outboxes: HashMap<ConnectionId, Peer<R::Target>>,
    registry: Weak<SessionMap<R>>,
    receiver: mpsc::Receiver<SessionCommand<R>>,
    shutdown: Arc<Notify>,
}

impl<R: RulesEngine> SessionActor<R> {
    /// Runs the actor loop until the session empties or is shut down.
    async fn run(mut self) {
        let session_id = self.session.id().clone();
        tracing::debug!(%session_id, "session actor started");

        loop {
            let cmd = tokio::select! {
                biased;
                _ = self.shutdown.notified() => {
                    tracing::info!(%session_id, "session shut down");
                    break;
                }
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => break,
                },
            };

            match cmd {
                SessionCommand::Join { peer, reply } => {
                    let _ = reply.send(self.handle_join(peer));
                }
                SessionCommand::Propose {
                    connection,
                    action,
                    reply,
                } => {
                    let _ = reply.send(self.handle_propose(connection, action));
                }
                SessionCommand::Query { args, reply } => {
                    let _ = reply.send(self.handle_query(&args));
                }
                SessionCommand::Depart { connection, reply } => {
                    let departure = self.handle_depart(connection);
                    let _ = reply.send(departure);
                    if departure == Departure::Closed {
                        break;
                    }
                }
                SessionCommand::Inspect { reply } => {
                    let _ = reply.send(self.info());
                }
            }
        }

        // Dropping `self.receiver` here fails every command still queued;
        // their callers see `Unavailable`.
        tracing::debug!(%session_id, "session actor stopped");
    }

    fn handle_join(&mut self, peer: Peer<R::Target>) -> Result<Role, SessionError> {
        let connection = peer.id();
        let admission = self.session.admit(connection)?;
        let role = admission.role();

        peer.send(ServerEvent::RoleAssigned { role });
        match admission {
            Admission::Seated(_) => {
                self.outboxes.insert(connection, peer);
                tracing::info!(
                    session_id = %self.session.id(),
                    %connection,
                    %role,
                    participants = self.session.participants().len(),
                    "participant joined"
                );
                self.broadcast(ServerEvent::SessionSnapshot(self.snapshot()));
            }
            Admission::AlreadySeated(_) => {
                // A replayed join: bring the caller up to date, nobody
                // else needs to hear about it.
                tracing::debug!(
                    session_id = %self.session.id(),
                    %connection,
                    "duplicate join, re-sending role"
                );
                peer.send(ServerEvent::SessionSnapshot(self.snapshot()));
                self.outboxes.insert(connection, peer);
            }
        }
        Ok(role)
    }

    fn handle_propose(
        &mut self,
        connection: ConnectionId,
        action: R::Action,
    ) -> Result<Role, SessionError> {
        let role = self.session.check_turn(connection)?;

        let engine = &self.engine;
        let state = self.session.state();
        let verdict = panic::catch_unwind(AssertUnwindSafe(|| engine.apply(state, &action)));
        let (next, outcome) = match verdict {
            Ok(Ok(Verdict::Accepted { state, outcome })) => (state, outcome),
            Ok(Ok(Verdict::Rejected { reason })) => {
                return Err(SessionError::InvalidAction(reason));
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    session_id = %self.session.id(),
                    %connection,
                    error = %e,
                    "rules engine failed evaluating action"
                );
                return Err(SessionError::InvalidAction(e.to_string()));
            }
            Err(_) => {
                tracing::error!(
                    session_id = %self.session.id(),
                    %connection,
                    "rules engine panicked evaluating action"
                );
                return Err(SessionError::InvalidAction("rules engine fault".into()));
            }
        };

        let Some(encoded) = encode_state(engine.as_ref(), &next) else {
            tracing::error!(
                session_id = %self.session.id(),
                %connection,
                "rules engine panicked encoding state"
            );
            return Err(SessionError::InvalidAction("rules engine fault".into()));
        };

        self.encoded = encoded;
        let turn_holder = self.session.advance(next, outcome.clone());
        tracing::info!(
            session_id = %self.session.id(),
            %connection,
            %role,
            next = %turn_holder,
            "transition applied"
        );
        self.broadcast(ServerEvent::TransitionApplied {
            state: self.encoded.clone(),
            turn_holder,
        });

        if let Some(summary) = outcome {
            tracing::info!(session_id = %self.session.id(), %summary, "session ended");
            self.broadcast(ServerEvent::SessionEnded { summary });
        }
        Ok(turn_holder)
    }

    fn handle_query(&self, args: &R::Query) -> Vec<R::Target> {
        let engine = &self.engine;
        let state = self.session.state();
        panic::catch_unwind(AssertUnwindSafe(|| engine.legal_targets(state, args)))
            .unwrap_or_else(|_| {
                tracing::error!(
                    session_id = %self.session.id(),
                    "rules engine panicked answering query"
                );
                Vec::new()
            })
    }

    fn handle_depart(&mut self, connection: ConnectionId) -> Departure {
        if !self.session.remove(connection) {
            return Departure::NotPresent;
        }
        self.outboxes.remove(&connection);

        let remaining = self.session.participants().len();
        tracing::info!(
            session_id = %self.session.id(),
            %connection,
            remaining,
            "participant departed"
        );

        if self.session.is_empty() {
            self.retire();
            return Departure::Closed;
        }

        self.broadcast(ServerEvent::SessionSnapshot(self.snapshot()));
        Departure::Left { remaining }
    }

    /// Deletes this session from the registry. Runs before the departure
    /// is acknowledged, so by the time the caller sees `Closed` a lookup
    /// by id already comes back empty.
    fn retire(&self) {
        if let Some(map) = self.registry.upgrade() {
            registry::remove_instance(&map, self.session.id(), self.instance);
        }
        tracing::info!(session_id = %self.session.id(), "session retired");
    }

    /// Sends `event` to every participant, in join order.
    fn broadcast(&self, event: ServerEvent<R::Target>) {
        for participant in self.session.participants() {
            if let Some(peer) = self.outboxes.get(&participant.connection) {
                peer.send(event.clone());
            }
        }
    }

    fn snapshot(&self) -> duelforge_protocol::Snapshot {
        self.session.snapshot(self.encoded.clone())
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session.id().clone(),
            phase: self.session.phase(),
            participants: self.session.participants().to_vec(),
            turn_holder: self.session.turn_holder(),
            state: self.encoded.clone(),
            outcome: self.session.outcome().map(str::to_owned),
        }
    }
}

/// Serializes `state`, or `None` if the engine panicked doing so.
fn encode_state<R: RulesEngine>(engine: &R, state: &R::State) -> Option<String> {
    panic::catch_unwind(AssertUnwindSafe(|| engine.encode_state(state))).ok()
}

/// Spawns a new session actor task and returns a handle to communicate
/// with it.
///
/// Must be called from within a Tokio runtime.
pub(crate) fn spawn_session<R: RulesEngine>(
    session_id: SessionId,
    instance: u64,
    engine: Arc<R>,
    channel_size: usize,
    registry: Weak<SessionMap<R>>,
) -> SessionHandle<R> {
    let (tx, rx) = mpsc::channel(channel_size.max(1));
    let shutdown = Arc::new(Notify::new());

    let state = engine.initial_state();
    let encoded = encode_state(engine.as_ref(), &state).unwrap_or_else(|| {
        tracing::error!(%session_id, "rules engine panicked encoding initial state");
        String::new()
    });

    let actor = SessionActor {
        session: Session::new(session_id.clone(), state),
        encoded,
        instance,
        engine,
        outboxes: HashMap::new(),
        registry,
        receiver: rx,
        shutdown: Arc::clone(&shutdown),
    };

    tokio::spawn(actor.run());

    SessionHandle {
        session_id,
        instance,
        sender: tx,
        shutdown,
    }
}

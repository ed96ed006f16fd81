//! The coordinator: turns client events into session commands.
//!
//! One `Coordinator` is shared by every connection task. It holds no
//! per-session state of its own; it looks sessions up in the registry and
//! forwards work to their actors, which serialize it. Rejections are
//! reported to the requesting peer only.

use duelforge_protocol::{ClientEvent, ConnectionId, Role, ServerEvent, SessionId};

use crate::{Departure, Peer, RulesEngine, SessionError, SessionHandle, SessionRegistry};

/// Routes client events and disconnects to session actors.
pub struct Coordinator<R: RulesEngine> {
    registry: SessionRegistry<R>,
}

impl<R: RulesEngine> Clone for Coordinator<R> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<R: RulesEngine> Coordinator<R> {
    pub fn new(registry: SessionRegistry<R>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SessionRegistry<R> {
        &self.registry
    }

    /// Handles one decoded client event from `peer`.
    ///
    /// On failure the matching `Rejected` event has already been sent to
    /// `peer`; the error is returned for the caller's logs.
    pub async fn handle(
        &self,
        peer: &Peer<R::Target>,
        event: ClientEvent<R::Action, R::Query>,
    ) -> Result<(), SessionError> {
        let kind = event.kind();
        let session_id = event.session_id().clone();
        let result = match event {
            ClientEvent::Join { session_id } => self.join(&session_id, peer).await.map(drop),
            ClientEvent::ProposeTransition { session_id, action } => {
                self.propose(&session_id, peer.id(), action).await.map(drop)
            }
            ClientEvent::Query { session_id, args } => {
                self.query(&session_id, peer, args).await.map(drop)
            }
        };

        if let Err(e) = &result {
            tracing::debug!(
                connection = %peer.id(),
                %session_id,
                kind,
                reason = %e.reason(),
                error = %e,
                "request rejected"
            );
            peer.send(e.to_event());
        }
        result
    }

    /// Seats `peer` in the session, creating the session if needed.
    ///
    /// The peer receives `RoleAssigned` and every participant a fresh
    /// snapshot.
    ///
    /// # Errors
    /// [`SessionError::RoomFull`] if both seats belong to other
    /// connections.
    pub async fn join(
        &self,
        session_id: &SessionId,
        peer: &Peer<R::Target>,
    ) -> Result<Role, SessionError> {
        loop {
            let handle = self.registry.get_or_create(session_id);
            match handle.join(peer.clone()).await {
                Err(SessionError::Unavailable(_)) => {
                    // The session retired under us; the next lookup finds
                    // a fresh one.
                    self.registry.discard(&handle);
                    tracing::debug!(%session_id, connection = %peer.id(), "retrying join");
                }
                other => return other,
            }
        }
    }

    /// Submits `action` on behalf of `connection`. On success every
    /// participant has been sent `TransitionApplied` (and `SessionEnded`
    /// if the move ended the game), and the new turn holder is returned.
    ///
    /// # Errors
    /// - [`SessionError::UnknownSession`] if there is no such session;
    /// - [`SessionError::NotAParticipant`], [`SessionError::NotYourTurn`];
    /// - [`SessionError::InvalidAction`] if the engine refuses the action,
    ///   fails on it, or the game is already over.
    pub async fn propose(
        &self,
        session_id: &SessionId,
        connection: ConnectionId,
        action: R::Action,
    ) -> Result<Role, SessionError> {
        let handle = self.lookup(session_id)?;
        handle
            .propose(connection, action)
            .await
            .map_err(|e| self.unknown_if_gone(e, &handle))
    }

    /// Answers a read-only question against the current state. The
    /// targets are sent to `peer` as a `QueryResult` and also returned.
    ///
    /// Any connection may ask, seated or not.
    pub async fn query(
        &self,
        session_id: &SessionId,
        peer: &Peer<R::Target>,
        args: R::Query,
    ) -> Result<Vec<R::Target>, SessionError> {
        let handle = self.lookup(session_id)?;
        let targets = handle
            .query(args)
            .await
            .map_err(|e| self.unknown_if_gone(e, &handle))?;
        peer.send(ServerEvent::QueryResult {
            targets: targets.clone(),
        });
        Ok(targets)
    }

    /// Removes `connection` from every session it is seated in. Sessions
    /// left empty are deleted; the others receive a fresh snapshot.
    ///
    /// Returns how many sessions the connection was removed from.
    /// Departing twice, or without ever joining, does nothing.
    pub async fn depart(&self, connection: ConnectionId) -> usize {
        let mut left = 0;
        for handle in self.registry.handles() {
            match handle.depart(connection).await {
                Ok(Departure::NotPresent) => {}
                Ok(Departure::Left { .. } | Departure::Closed) => left += 1,
                // Stopped without retiring; nobody can reach it anymore.
                Err(_) => self.registry.discard(&handle),
            }
        }
        if left > 0 {
            tracing::debug!(%connection, sessions = left, "connection departed");
        }
        left
    }

    fn lookup(&self, session_id: &SessionId) -> Result<SessionHandle<R>, SessionError> {
        self.registry
            .get(session_id)
            .ok_or_else(|| SessionError::UnknownSession(session_id.clone()))
    }

    /// Reports a stopped actor as a missing session, dropping its entry.
    fn unknown_if_gone(&self, e: SessionError, handle: &SessionHandle<R>) -> SessionError {
        match e {
            SessionError::Unavailable(id) => {
                self.registry.discard(handle);
                SessionError::UnknownSession(id)
            }
            other => other,
        }
    }
}

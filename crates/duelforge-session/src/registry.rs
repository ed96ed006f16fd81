//! Session registry: creates, finds and removes session actors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use duelforge_protocol::SessionId;

use crate::actor::spawn_session;
use crate::{RulesEngine, SessionConfig, SessionHandle};

/// Counter distinguishing successive actors created under the same id.
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

pub(crate) type SessionMap<R> = Mutex<HashMap<SessionId, SessionHandle<R>>>;

/// Every live session on the server, keyed by id.
///
/// The map lock is held only for lookups and inserts, never across an
/// `.await`; all per-session work happens inside the session's actor.
/// Cloning a registry gives another view of the same sessions.
pub struct SessionRegistry<R: RulesEngine> {
    sessions: Arc<SessionMap<R>>,
    engine: Arc<R>,
    config: SessionConfig,
}

impl<R: RulesEngine> Clone for SessionRegistry<R> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            engine: Arc::clone(&self.engine),
            config: self.config.clone(),
        }
    }
}

impl<R: RulesEngine> SessionRegistry<R> {
    /// Creates an empty registry whose sessions are played under `engine`.
    pub fn new(engine: R, config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            engine: Arc::new(engine),
            config,
        }
    }

    /// Returns the session registered under `id`, creating it first if
    /// there is none.
    ///
    /// Atomic with respect to every other registry operation: two callers
    /// racing on a fresh id get handles to the same session.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn get_or_create(&self, id: &SessionId) -> SessionHandle<R> {
        let mut sessions = self.lock();
        if let Some(handle) = sessions.get(id) {
            return handle.clone();
        }

        let instance = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
        let handle = spawn_session(
            id.clone(),
            instance,
            Arc::clone(&self.engine),
            self.config.command_buffer,
            Arc::downgrade(&self.sessions),
        );
        sessions.insert(id.clone(), handle.clone());
        tracing::info!(session_id = %id, "session created");
        handle
    }

    /// Looks up a session without creating it.
    pub fn get(&self, id: &SessionId) -> Option<SessionHandle<R>> {
        self.lock().get(id).cloned()
    }

    /// Deletes a session and stops its actor. Returns `false` if there
    /// was nothing to delete.
    pub fn remove(&self, id: &SessionId) -> bool {
        let removed = self.lock().remove(id);
        match removed {
            Some(handle) => {
                handle.shutdown();
                tracing::info!(session_id = %id, "session removed");
                true
            }
            None => false,
        }
    }

    /// Drops the entry for `handle`'s session if it still refers to that
    /// very actor. Used once the actor is known to have stopped.
    pub(crate) fn discard(&self, handle: &SessionHandle<R>) {
        remove_instance(&self.sessions, handle.session_id(), handle.instance());
    }

    /// Cloned handles to every live session, for work that must not hold
    /// the registry lock.
    pub fn handles(&self) -> Vec<SessionHandle<R>> {
        self.lock().values().cloned().collect()
    }

    /// Ids of every live session, sorted.
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionHandle<R>>> {
        lock_map(&self.sessions)
    }
}

/// Removes `id` only if it still maps to the actor `instance`. A session
/// retiring itself must not evict a successor that reused its id.
pub(crate) fn remove_instance<R: RulesEngine>(
    sessions: &SessionMap<R>,
    id: &SessionId,
    instance: u64,
) {
    let mut sessions = lock_map(sessions);
    if sessions.get(id).is_some_and(|h| h.instance() == instance) {
        sessions.remove(id);
    }
}

fn lock_map<R: RulesEngine>(
    sessions: &SessionMap<R>,
) -> MutexGuard<'_, HashMap<SessionId, SessionHandle<R>>> {
    // Nothing panics while holding the lock, but a poisoned map is still
    // structurally sound.
    sessions.lock().unwrap_or_else(|e| e.into_inner())
}

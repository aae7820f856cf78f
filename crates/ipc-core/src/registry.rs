//! Worker id → session token mapping.
//!
//! Only worker sessions are recorded here; the controller has no id and
//! its connect/disconnect events are handled by the broker directly.

use dashmap::DashMap;

use crate::types::{SessionToken, WorkerId};

/// Registry of connected workers and their current session.
///
/// Backed by a sharded concurrent map, so events for different workers
/// never contend on a single lock and each key is updated atomically.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: DashMap<WorkerId, SessionToken>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        ConnectionRegistry::default()
    }

    /// Record `id → token`, replacing any previous session for `id`.
    ///
    /// Returns the token that was replaced, if any.
    pub fn connect(&self, id: WorkerId, token: SessionToken) -> Option<SessionToken> {
        self.sessions.insert(id, token)
    }

    /// Resumed session after a transient transport failure.
    ///
    /// Same effect as [`connect`](Self::connect); kept separate so the
    /// two events stay distinguishable in logs and at call sites.
    pub fn reconnect(&self, id: WorkerId, token: SessionToken) -> Option<SessionToken> {
        self.sessions.insert(id, token)
    }

    /// Remove the mapping for `id` if it still points at `token`.
    ///
    /// A disconnect from an older session must not evict the session the
    /// worker has since reconnected with. Removing an absent key is a no-op.
    pub fn disconnect(&self, id: WorkerId, token: SessionToken) -> bool {
        self.sessions
            .remove_if(&id, |_, current| *current == token)
            .is_some()
    }

    /// Current session for `id`, or `None` if never connected or gone.
    pub fn lookup(&self, id: WorkerId) -> Option<SessionToken> {
        self.sessions.get(&id).map(|entry| *entry.value())
    }

    /// Snapshot of every live worker session.
    pub fn tokens(&self) -> Vec<(WorkerId, SessionToken)> {
        self.sessions
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

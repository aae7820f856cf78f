//! Identity types shared by the broker and the transport.
//!
//! - [`WorkerId`]: externally assigned worker identity.
//! - [`SessionToken`]: transport-assigned handle for a live connection.
//! - [`Role`] / [`Session`]: who is on the other end of a connection.

use std::fmt;

/// Logical identity of a worker process.
///
/// Assigned by whoever spawns the worker (the host passes it on the
/// command line) and stable for the lifetime of that process, across
/// reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a live transport session.
///
/// This is intentionally opaque; the transport guarantees uniqueness
/// over the lifetime of the process and never reuses a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(pub u64);

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Role of a connected session.
///
/// A session that declares no worker id during the handshake is the
/// controller; every other session is a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Controller,
    Worker(WorkerId),
}

impl Role {
    /// Build a role from the optional id carried in the handshake.
    pub fn from_handshake(worker_id: Option<WorkerId>) -> Self {
        match worker_id {
            Some(id) => Role::Worker(id),
            None => Role::Controller,
        }
    }

    pub fn worker_id(self) -> Option<WorkerId> {
        match self {
            Role::Controller => None,
            Role::Worker(id) => Some(id),
        }
    }

    pub fn is_controller(self) -> bool {
        matches!(self, Role::Controller)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Controller => write!(f, "controller"),
            Role::Worker(id) => write!(f, "worker {}", id),
        }
    }
}

/// Authenticated identity of one connection.
///
/// Fixed when the handshake completes; later messages from the peer
/// are always attributed to this session, never to ids they repeat back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub token: SessionToken,
    pub role: Role,
}

impl Session {
    pub fn new(token: SessionToken, role: Role) -> Self {
        Session { token, role }
    }

    pub fn controller(token: SessionToken) -> Self {
        Session::new(token, Role::Controller)
    }

    pub fn worker(token: SessionToken, id: WorkerId) -> Self {
        Session::new(token, Role::Worker(id))
    }
}

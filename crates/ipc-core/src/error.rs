//! Error types for the broker core.
//!
//! None of these are fatal: the broker logs them and carries on. They
//! are returned so callers (and tests) can tell a rejected message from
//! an accepted one.

use thiserror::Error;

use crate::messages::MessageKind;
use crate::types::{Role, SessionToken, WorkerId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// A reply claimed an id other than the one the session connected with.
    #[error("reply claims worker {claimed} but session belongs to worker {authenticated}")]
    IdentityMismatch {
        claimed: WorkerId,
        authenticated: WorkerId,
    },

    /// A reply arrived on a session that is no longer the registered
    /// session for its worker (the worker has since reconnected).
    #[error("session {token} is no longer registered for worker {worker}")]
    StaleSession { worker: WorkerId, token: SessionToken },

    /// The session's role does not permit this message.
    #[error("{command} is not permitted for {role}")]
    Unauthorized { command: MessageKind, role: Role },
}

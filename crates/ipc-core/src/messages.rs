//! Message types exchanged between the broker and its peers.
//!
//! These are **transport-agnostic** logical messages:
//! - [`Request`]: what a peer (controller or worker) sends to the broker.
//! - [`Command`]: what the broker pushes to a worker.
//! - [`Reply`]: what the broker answers to a controller request.
//!
//! Binary / text encoders live in the `ipc-protocol` crate;
//! this module is purely logical.

use std::fmt;

use crate::types::WorkerId;

/// Closed set of protocol-level message kinds.
///
/// Used for authorization decisions and logging; the handler table in
/// [`crate::Broker::dispatch`] matches on [`Request`] directly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ShutDown,
    GetName,
    ReturnName,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::ShutDown => "ShutDown",
            MessageKind::GetName => "GetName",
            MessageKind::ReturnName => "ReturnName",
        };
        f.write_str(name)
    }
}

/// A request from a connected peer into the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Order every worker to shut down. Controller only.
    ShutDown,

    /// Ask one worker for its name and wait for the answer. Controller only.
    GetName { worker_id: WorkerId },

    /// A worker answering a `GetName` command with its own id.
    ReturnName { worker_id: WorkerId, name: String },
}

impl Request {
    pub fn kind(&self) -> MessageKind {
        match self {
            Request::ShutDown => MessageKind::ShutDown,
            Request::GetName { .. } => MessageKind::GetName,
            Request::ReturnName { .. } => MessageKind::ReturnName,
        }
    }
}

/// A command pushed by the broker to a worker session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    /// Disconnect and terminate.
    ShutDown,

    /// Report your name back with `ReturnName`.
    GetName,
}

/// Answer to a controller request that expects a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Result of `GetName`; `None` when the worker is unknown, did not
    /// answer in time, or a shutdown interrupted the wait.
    Name {
        worker_id: WorkerId,
        name: Option<String>,
    },
}

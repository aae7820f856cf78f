//! Shared types for the broker TCP server.
//!
//! This module defines:
//! - channel aliases for messages flowing to a session's writer task
//! - `Outbound`: the live sessions' send side, which is also the
//!   broker's [`CommandSink`]

use dashmap::DashMap;
use ipc_core::{Command, CommandSink, SessionToken};
use ipc_protocol::ServerMessage;
use tokio::sync::mpsc;

/// Outbound messages from the broker to a given session.
pub type OutboundTx = mpsc::UnboundedSender<ServerMessage>;
pub type OutboundRx = mpsc::UnboundedReceiver<ServerMessage>;

/// Registry of connected sessions and their outbound channels.
///
/// - Key: `SessionToken`
/// - Value: `OutboundTx` feeding that session's writer task.
///
/// Entries exist from accept until the session's reader loop ends,
/// whether or not the handshake completed.
#[derive(Debug, Default)]
pub struct Outbound {
    sessions: DashMap<SessionToken, OutboundTx>,
}

impl Outbound {
    pub fn new() -> Self {
        Outbound::default()
    }

    pub fn register(&self, token: SessionToken, tx: OutboundTx) {
        self.sessions.insert(token, tx);
    }

    pub fn unregister(&self, token: SessionToken) {
        self.sessions.remove(&token);
    }

    /// Queue `msg` for `token`; `false` if the session is gone.
    pub fn send(&self, token: SessionToken, msg: ServerMessage) -> bool {
        match self.sessions.get(&token) {
            Some(tx) => tx.send(msg).is_ok(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl CommandSink for Outbound {
    fn deliver(&self, token: SessionToken, command: Command) -> bool {
        self.send(token, ServerMessage::Command(command))
    }
}

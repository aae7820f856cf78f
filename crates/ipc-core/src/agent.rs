//! Worker-side state machine.
//!
//! ```text
//!   Connected --GetName--> Connected   (reply with ReturnName)
//!   Connected --ShutDown-> Terminated  (disconnect, exit)
//! ```
//!
//! The agent decides; the caller owns the connection and performs the
//! returned [`AgentAction`].

use crate::messages::{Command, Request};
use crate::types::WorkerId;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AgentState {
    Connected,
    Terminated,
}

/// What the owner of the connection should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentAction {
    /// Send this request back to the broker; stay connected.
    Reply(Request),
    /// Close the connection and exit.
    Disconnect,
    /// Nothing to do.
    Ignore,
}

#[derive(Debug)]
pub struct WorkerAgent {
    id: WorkerId,
    name: String,
    state: AgentState,
}

impl WorkerAgent {
    /// Agent for a worker that has just completed its handshake.
    pub fn new(id: WorkerId) -> Self {
        WorkerAgent {
            id,
            name: format!("Client {}", id),
            state: AgentState::Connected,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == AgentState::Terminated
    }

    pub fn handle(&mut self, command: Command) -> AgentAction {
        if self.is_terminated() {
            return AgentAction::Ignore;
        }

        match command {
            Command::ShutDown => {
                self.state = AgentState::Terminated;
                AgentAction::Disconnect
            }
            Command::GetName => AgentAction::Reply(Request::ReturnName {
                worker_id: self.id,
                name: self.name.clone(),
            }),
        }
    }
}

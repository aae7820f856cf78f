//! ipc-core
//!
//! Pure broker logic, no networking:
//! - identities (worker ids, session tokens, roles)
//! - messages (requests, commands, replies)
//! - worker registry
//! - request/reply correlation with bounded waits
//! - shutdown coordination
//! - the broker façade and the worker-side agent

pub mod types;
pub mod messages;
pub mod error;
pub mod sink;
pub mod registry;
pub mod correlator;
pub mod shutdown;
pub mod broker;
pub mod agent;

pub use types::{Role, Session, SessionToken, WorkerId};

pub use messages::{Command, MessageKind, Reply, Request};

pub use error::BrokerError;
pub use sink::CommandSink;
pub use registry::ConnectionRegistry;
pub use correlator::{RequestCorrelator, WaitOutcome};
pub use shutdown::ShutdownCoordinator;
pub use broker::{Broker, BrokerConfig, DEFAULT_REPLY_TIMEOUT};
pub use agent::{AgentAction, AgentState, WorkerAgent};

//! ipc-server
//!
//! Multi-session async TCP transport for the worker broker.

pub mod config;
pub mod types;
pub mod server;

// internal module, not re-exported
mod session;

pub use server::Server;

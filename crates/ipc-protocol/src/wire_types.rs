//! Low-level wire types and constants.
//!
//! This module defines:
//! - Message type IDs for client and server frames.
//! - Protocol versioning.
//! - The handshake message and the two top-level frame enums.
//!
//! The actual encode/decode logic lives in `binary_codec`.

use ipc_core::{Command, Reply, Request, WorkerId};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Message types sent by peers (client → server).
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WireClientType {
    /// Session handshake, carries the optional worker id.
    Hello = 0,

    /// Controller orders shutdown.
    ShutDown = 1,

    /// Controller asks a worker's name.
    GetName = 2,

    /// Worker answers with its name.
    ReturnName = 3,
}

impl WireClientType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(WireClientType::Hello),
            1 => Some(WireClientType::ShutDown),
            2 => Some(WireClientType::GetName),
            3 => Some(WireClientType::ReturnName),
            _ => None,
        }
    }
}

/// Message types sent by the broker (server → client).
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WireServerType {
    /// Command: disconnect and exit.
    ShutDown = 10,

    /// Command: report your name.
    GetName = 11,

    /// Answer to a controller's `GetName`.
    NameResult = 12,
}

impl WireServerType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            10 => Some(WireServerType::ShutDown),
            11 => Some(WireServerType::GetName),
            12 => Some(WireServerType::NameResult),
            _ => None,
        }
    }
}

/// Hello flag: a worker id follows.
pub const HELLO_HAS_WORKER_ID: u8 = 0b01;

/// Hello flag: the session resumes after a transport failure.
pub const HELLO_RESUMED: u8 = 0b10;

/// Maximum worker name length on the wire, in UTF-8 bytes.
pub const MAX_NAME_LEN: usize = 256;

/// Largest frame either side can legitimately send: a `NameResult` or
/// `ReturnName` (header, id, present flag, length) carrying a full name.
pub const MAX_FRAME_LEN: usize = 4 + 4 + 1 + 2 + MAX_NAME_LEN;

pub fn validate_name_len(len: usize) -> bool {
    len <= MAX_NAME_LEN
}

/// First message on every connection.
///
/// No worker id means the peer is the controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Hello {
    pub worker_id: Option<WorkerId>,

    /// `true` when re-establishing a session that was lost, rather than
    /// connecting for the first time.
    pub resumed: bool,
}

impl Hello {
    pub fn controller() -> Self {
        Hello {
            worker_id: None,
            resumed: false,
        }
    }

    pub fn worker(id: WorkerId) -> Self {
        Hello {
            worker_id: Some(id),
            resumed: false,
        }
    }

    pub fn resume(self) -> Self {
        Hello {
            resumed: true,
            ..self
        }
    }
}

/// Anything a peer can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Hello(Hello),
    Request(Request),
}

/// Anything the broker can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Command(Command),
    Reply(Reply),
}

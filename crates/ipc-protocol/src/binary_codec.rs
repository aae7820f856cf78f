//! Binary encoding/decoding for broker messages.
//!
//! Framing model (single-message buffer):
//!
//! ```text
//! Every frame
//! -----------
//! [0]   : msg_type (WireClientType / WireServerType as u8)
//! [1]   : version  (PROTOCOL_VERSION)
//! [2..4]: reserved = 0
//! [4..] : body (depends on msg_type)
//!
//! Client → server
//! ---------------
//! Hello (type=0):
//!   [4]      flags (bit0 = has worker id, bit1 = resumed)
//!   [5..9]   worker_id (u32 BE, 0 when absent)
//!
//! ShutDown (type=1):
//!   [no body]
//!
//! GetName (type=2):
//!   [4..8]   worker_id (u32 BE)
//!
//! ReturnName (type=3):
//!   [4..8]   worker_id (u32 BE)
//!   [8..10]  name_len (u16 BE, 0..=MAX_NAME_LEN)
//!   [10..]   name bytes (UTF-8)
//!
//! Server → client
//! ---------------
//! ShutDown (type=10), GetName (type=11):
//!   [no body]
//!
//! NameResult (type=12):
//!   [4..8]   worker_id (u32 BE)
//!   [8]      present (0/1)
//!   [9..11]  name_len (u16 BE, 0 when absent)
//!   [11..]   name bytes (UTF-8)
//! ```
//!
//! NOTE: This module encodes/decodes **one message per buffer**. On TCP
//! each frame is preceded by its length as a u32 BE.

use std::fmt;

use ipc_core::{Command, Reply, Request, WorkerId};

use crate::wire_types::{
    validate_name_len, ClientMessage, Hello, ServerMessage, WireClientType, WireServerType,
    HELLO_HAS_WORKER_ID, HELLO_RESUMED, MAX_NAME_LEN, PROTOCOL_VERSION,
};

/// Errors that can arise when encoding/decoding a binary frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer too short for the expected fields.
    Truncated,
    /// Unknown or unsupported message type.
    UnknownMessageType(u8),
    /// Unsupported or mismatched protocol version.
    VersionMismatch(u8),
    /// Name too long or malformed UTF-8.
    InvalidName,
    /// Invalid flag or other semantic issue.
    InvalidField(&'static str),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Truncated => write!(f, "Buffer truncated"),
            ProtocolError::UnknownMessageType(t) => write!(f, "Unknown message type: {}", t),
            ProtocolError::VersionMismatch(v) => {
                write!(f, "Protocol version mismatch: got {}, expected {}", v, PROTOCOL_VERSION)
            }
            ProtocolError::InvalidName => write!(f, "Invalid name"),
            ProtocolError::InvalidField(field) => write!(f, "Invalid field: {}", field),
        }
    }
}

impl std::error::Error for ProtocolError {}

// ============================================================================
// CLIENT: peer → broker
// ============================================================================

/// Decode a single client message from a binary buffer.
pub fn decode_client(buf: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg_type = read_header(buf)?;
    let wire_type =
        WireClientType::from_u8(msg_type).ok_or(ProtocolError::UnknownMessageType(msg_type))?;

    match wire_type {
        WireClientType::Hello => decode_hello(buf),
        WireClientType::ShutDown => Ok(ClientMessage::Request(Request::ShutDown)),
        WireClientType::GetName => {
            let worker_id = read_worker_id(buf, 4)?;
            Ok(ClientMessage::Request(Request::GetName { worker_id }))
        }
        WireClientType::ReturnName => {
            let worker_id = read_worker_id(buf, 4)?;
            let name = read_name(buf, 8)?;
            Ok(ClientMessage::Request(Request::ReturnName { worker_id, name }))
        }
    }
}

/// Encode a single client message; the bytes are appended to `out`.
pub fn encode_client(msg: &ClientMessage, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    match msg {
        ClientMessage::Hello(hello) => {
            write_header(WireClientType::Hello as u8, out);
            let mut flags = 0;
            if hello.worker_id.is_some() {
                flags |= HELLO_HAS_WORKER_ID;
            }
            if hello.resumed {
                flags |= HELLO_RESUMED;
            }
            out.push(flags);
            out.extend_from_slice(&hello.worker_id.map_or(0, |id| id.0).to_be_bytes());
        }
        ClientMessage::Request(Request::ShutDown) => {
            write_header(WireClientType::ShutDown as u8, out);
        }
        ClientMessage::Request(Request::GetName { worker_id }) => {
            write_header(WireClientType::GetName as u8, out);
            out.extend_from_slice(&worker_id.0.to_be_bytes());
        }
        ClientMessage::Request(Request::ReturnName { worker_id, name }) => {
            check_name(name)?;
            write_header(WireClientType::ReturnName as u8, out);
            out.extend_from_slice(&worker_id.0.to_be_bytes());
            write_name(name, out);
        }
    }
    Ok(())
}

fn decode_hello(buf: &[u8]) -> Result<ClientMessage, ProtocolError> {
    if buf.len() < 9 {
        return Err(ProtocolError::Truncated);
    }

    let flags = buf[4];
    if flags & !(HELLO_HAS_WORKER_ID | HELLO_RESUMED) != 0 {
        return Err(ProtocolError::InvalidField("flags"));
    }

    let worker_id = if flags & HELLO_HAS_WORKER_ID != 0 {
        Some(read_worker_id(buf, 5)?)
    } else {
        None
    };

    Ok(ClientMessage::Hello(Hello {
        worker_id,
        resumed: flags & HELLO_RESUMED != 0,
    }))
}

// ============================================================================
// SERVER: broker → peer
// ============================================================================

/// Encode a single server message; the bytes are appended to `out`.
pub fn encode_server(msg: &ServerMessage, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    match msg {
        ServerMessage::Command(Command::ShutDown) => {
            write_header(WireServerType::ShutDown as u8, out);
        }
        ServerMessage::Command(Command::GetName) => {
            write_header(WireServerType::GetName as u8, out);
        }
        ServerMessage::Reply(Reply::Name { worker_id, name }) => {
            if let Some(name) = name {
                check_name(name)?;
            }
            write_header(WireServerType::NameResult as u8, out);
            out.extend_from_slice(&worker_id.0.to_be_bytes());
            match name {
                Some(name) => {
                    out.push(1);
                    write_name(name, out);
                }
                None => {
                    out.push(0);
                    out.extend_from_slice(&0u16.to_be_bytes());
                }
            }
        }
    }
    Ok(())
}

/// Decode a single server message from a binary buffer.
///
/// This is what peers use when reading from the broker.
pub fn decode_server(buf: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = read_header(buf)?;
    let wire_type =
        WireServerType::from_u8(msg_type).ok_or(ProtocolError::UnknownMessageType(msg_type))?;

    match wire_type {
        WireServerType::ShutDown => Ok(ServerMessage::Command(Command::ShutDown)),
        WireServerType::GetName => Ok(ServerMessage::Command(Command::GetName)),
        WireServerType::NameResult => {
            let worker_id = read_worker_id(buf, 4)?;
            if buf.len() < 9 {
                return Err(ProtocolError::Truncated);
            }
            let name = match buf[8] {
                0 => None,
                1 => Some(read_name(buf, 9)?),
                _ => return Err(ProtocolError::InvalidField("present")),
            };
            Ok(ServerMessage::Reply(Reply::Name { worker_id, name }))
        }
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn write_header(msg_type: u8, out: &mut Vec<u8>) {
    out.push(msg_type);
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&[0, 0]); // reserved
}

/// Validate the common header and return the message type byte.
fn read_header(buf: &[u8]) -> Result<u8, ProtocolError> {
    if buf.len() < 4 {
        return Err(ProtocolError::Truncated);
    }

    let version = buf[1];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch(version));
    }

    Ok(buf[0])
}

fn read_worker_id(buf: &[u8], offset: usize) -> Result<WorkerId, ProtocolError> {
    let bytes = buf
        .get(offset..offset + 4)
        .ok_or(ProtocolError::Truncated)?;
    Ok(WorkerId(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])))
}

fn check_name(name: &str) -> Result<(), ProtocolError> {
    if validate_name_len(name.len()) {
        Ok(())
    } else {
        Err(ProtocolError::InvalidName)
    }
}

/// Length-prefixed name; callers have already run `check_name`.
fn write_name(name: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(&(name.len() as u16).to_be_bytes());
    out.extend_from_slice(name.as_bytes());
}

fn read_name(buf: &[u8], offset: usize) -> Result<String, ProtocolError> {
    let len_bytes = buf
        .get(offset..offset + 2)
        .ok_or(ProtocolError::Truncated)?;
    let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
    if len > MAX_NAME_LEN {
        return Err(ProtocolError::InvalidName);
    }

    let start = offset + 2;
    let name_bytes = buf.get(start..start + len).ok_or(ProtocolError::Truncated)?;
    std::str::from_utf8(name_bytes)
        .map(str::to_string)
        .map_err(|_| ProtocolError::InvalidName)
}

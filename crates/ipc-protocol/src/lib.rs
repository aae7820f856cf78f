//! ipc-protocol
//!
//! Wire-level encoding/decoding between the broker and its peers.
//!
//! This crate is responsible for turning logical broker messages
//! (`ipc_core::Request` / `Command` / `Reply`, plus the session
//! handshake) into bytes and back again.
//!
//! - [`binary_codec`] : binary wire protocol (what `ipc-node` speaks)
//! - [`csv_codec`]    : line-oriented text, for poking at the broker with `nc`

pub mod wire_types;
pub mod binary_codec;
pub mod csv_codec;

pub use wire_types::{ClientMessage, Hello, ServerMessage};

pub use binary_codec::{
    ProtocolError,
    decode_client,
    encode_client,
    decode_server,
    encode_server,
};

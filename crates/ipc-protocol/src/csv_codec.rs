// crates/ipc-protocol/src/csv_codec.rs

//! Line-oriented text codec.
//!
//! Lets a human drive the broker with `nc`. One message per line, fields
//! separated by commas.
//!
//! Client lines (line → `ClientMessage`):
//!
//! - Hello as controller / worker:
//!   `H` / `H, workerId(int)`
//!
//! - Resumed hello after a dropped connection:
//!   `RH` / `RH, workerId(int)`
//!
//! - ShutDown:
//!   `S`
//!
//! - GetName:
//!   `G, workerId(int)`
//!
//! - ReturnName (the name is everything after the second comma):
//!   `N, workerId(int), name(string)`
//!   The name obeys the binary limit of `MAX_NAME_LEN` bytes and may not
//!   be `-`, which the server side uses for "no name".
//!
//! Server lines (`ServerMessage` → line):
//!
//! - ShutDown command: `S`
//! - GetName command:  `G`
//! - Name result:      `R, workerId, name` or `R, workerId, -` when absent
//!
//! A binary peer can still report a name of literally `-`; on a text
//! session that reads the same as an absent name.

use ipc_core::{Command, Reply, Request, WorkerId};

use crate::wire_types::{validate_name_len, ClientMessage, Hello, ServerMessage};

/// Placeholder for an absent name in `R` lines.
const NO_NAME: &str = "-";

/// Parse a single text line into a `ClientMessage`.
///
/// Returns `None` for blank lines, comments (starting with `#`) and
/// anything malformed.
pub fn parse_client_line(line: &str) -> Option<ClientMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let tokens: Vec<&str> = trimmed.splitn(3, ',').map(str::trim).collect();

    match tokens[0] {
        "H" => parse_hello(&tokens, false),
        "RH" => parse_hello(&tokens, true),
        "S" if tokens.len() == 1 => Some(ClientMessage::Request(Request::ShutDown)),
        "G" if tokens.len() == 2 => {
            let worker_id = parse_worker_id(tokens[1])?;
            Some(ClientMessage::Request(Request::GetName { worker_id }))
        }
        "N" if tokens.len() == 3 => {
            let worker_id = parse_worker_id(tokens[1])?;
            let name = parse_name(tokens[2])?;
            Some(ClientMessage::Request(Request::ReturnName { worker_id, name }))
        }
        _ => None,
    }
}

fn parse_hello(tokens: &[&str], resumed: bool) -> Option<ClientMessage> {
    let worker_id = match tokens.len() {
        1 => None,
        2 => Some(parse_worker_id(tokens[1])?),
        _ => return None,
    };
    Some(ClientMessage::Hello(Hello { worker_id, resumed }))
}

/// Format a `ClientMessage` as a text line (no trailing newline).
pub fn format_client_line(msg: &ClientMessage) -> String {
    match msg {
        ClientMessage::Hello(hello) => {
            let tag = if hello.resumed { "RH" } else { "H" };
            match hello.worker_id {
                Some(id) => format!("{}, {}", tag, id),
                None => tag.to_string(),
            }
        }
        ClientMessage::Request(Request::ShutDown) => "S".to_string(),
        ClientMessage::Request(Request::GetName { worker_id }) => format!("G, {}", worker_id),
        ClientMessage::Request(Request::ReturnName { worker_id, name }) => {
            format!("N, {}, {}", worker_id, name)
        }
    }
}

/// Format a `ServerMessage` as a text line (no trailing newline).
pub fn format_server_line(msg: &ServerMessage) -> String {
    match msg {
        ServerMessage::Command(Command::ShutDown) => "S".to_string(),
        ServerMessage::Command(Command::GetName) => "G".to_string(),
        ServerMessage::Reply(Reply::Name { worker_id, name }) => {
            format!("R, {}, {}", worker_id, name.as_deref().unwrap_or(NO_NAME))
        }
    }
}

/// Parse a server text line back into a `ServerMessage`.
///
/// A name result of `-` reads back as "no name".
pub fn parse_server_line(line: &str) -> Option<ServerMessage> {
    let tokens: Vec<&str> = line.trim().splitn(3, ',').map(str::trim).collect();

    match tokens.as_slice() {
        ["S"] => Some(ServerMessage::Command(Command::ShutDown)),
        ["G"] => Some(ServerMessage::Command(Command::GetName)),
        ["R", id, name] => {
            let worker_id = parse_worker_id(id)?;
            let name = (*name != NO_NAME).then(|| name.to_string());
            Some(ServerMessage::Reply(Reply::Name { worker_id, name }))
        }
        _ => None,
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn parse_worker_id(s: &str) -> Option<WorkerId> {
    s.parse::<u32>().ok().map(WorkerId)
}

fn parse_name(s: &str) -> Option<String> {
    if s == NO_NAME || !validate_name_len(s.len()) {
        return None;
    }
    Some(s.to_string())
}

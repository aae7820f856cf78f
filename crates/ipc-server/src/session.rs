// crates/ipc-server/src/session.rs
// Handles BOTH the binary and the text protocol

use std::sync::Arc;

use anyhow::{bail, Context};
use ipc_core::{Broker, Reply, Role, Session, SessionToken};
use ipc_protocol::wire_types::MAX_FRAME_LEN;
use ipc_protocol::{binary_codec, csv_codec, ClientMessage, Hello, ProtocolError, ServerMessage};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::types::{Outbound, OutboundRx};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Protocol {
    Binary,
    Text,
}

/// Run the I/O loops for a single connection.
///
/// The first message must be a `Hello`; it fixes the session's role for
/// the rest of the connection. Each later request is dispatched in its
/// own task so a controller waiting on a `GetName` never stalls the
/// reader.
pub async fn run_session(
    token: SessionToken,
    stream: TcpStream,
    broker: Arc<Broker>,
    outbound: Arc<Outbound>,
    out_rx: OutboundRx,
) -> anyhow::Result<()> {
    let (mut read_half, write_half) = stream.into_split();

    // Hello lines start with `H` or `RH`; binary frames with a length prefix.
    let mut first_byte = [0u8; 1];
    let protocol = match read_half.peek(&mut first_byte).await {
        Ok(n) if n > 0 && matches!(first_byte[0], b'H' | b'R') => Protocol::Text,
        _ => Protocol::Binary,
    };
    debug!(session = %token, ?protocol, "protocol detected");

    // Ends on its own once the session's sender is unregistered.
    tokio::spawn(run_writer(token, protocol, write_half, out_rx));

    let mut reader = MessageReader::new(protocol, read_half);
    let result = run_reader(token, &mut reader, &broker, &outbound).await;

    outbound.unregister(token);
    result
}

async fn run_reader(
    token: SessionToken,
    reader: &mut MessageReader,
    broker: &Arc<Broker>,
    outbound: &Arc<Outbound>,
) -> anyhow::Result<()> {
    let hello = match reader.next(token).await? {
        Some(ClientMessage::Hello(hello)) => hello,
        Some(other) => bail!("expected Hello, got {:?}", other),
        None => return Ok(()),
    };

    let session = Session::new(token, Role::from_handshake(hello.worker_id));
    handshake(broker, &session, hello);

    let result = loop {
        let msg = match reader.next(token).await {
            Ok(Some(msg)) => msg,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        };

        match msg {
            ClientMessage::Hello(_) => {
                warn!(session = %token, "duplicate Hello ignored");
            }
            ClientMessage::Request(request) => {
                debug!(session = %token, kind = %request.kind(), "request");
                let broker = broker.clone();
                let outbound = outbound.clone();
                tokio::spawn(async move {
                    if let Some(reply) = broker.dispatch(&session, request).await {
                        outbound.send(token, ServerMessage::Reply(reply));
                    }
                });
            }
        }
    };

    broker.on_disconnect(&session);
    result
}

fn handshake(broker: &Broker, session: &Session, hello: Hello) {
    if hello.resumed {
        broker.on_reconnect(session);
    } else {
        broker.on_connect(session);
    }
}

async fn run_writer(
    token: SessionToken,
    protocol: Protocol,
    mut write_half: OwnedWriteHalf,
    mut out_rx: OutboundRx,
) {
    while let Some(msg) = out_rx.recv().await {
        let bytes = match protocol {
            Protocol::Binary => match encode_binary_frame(&msg) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(session = %token, error = %e, ?msg, "message not encodable");
                    match without_name(&msg).map(|msg| encode_binary_frame(&msg)) {
                        Some(Ok(frame)) => frame,
                        _ => continue,
                    }
                }
            },
            Protocol::Text => encode_text_line(&msg),
        };

        if let Err(e) = write_all_and_flush(&mut write_half, &bytes).await {
            warn!(session = %token, error = %e, "write failed");
            break;
        }
    }
}

/// Reads `ClientMessage`s in whichever protocol the session speaks.
enum MessageReader {
    Binary(OwnedReadHalf),
    Text(BufReader<OwnedReadHalf>),
}

impl MessageReader {
    fn new(protocol: Protocol, read_half: OwnedReadHalf) -> Self {
        match protocol {
            Protocol::Binary => MessageReader::Binary(read_half),
            Protocol::Text => MessageReader::Text(BufReader::new(read_half)),
        }
    }

    /// Next message, or `None` once the peer has closed the connection.
    async fn next(&mut self, token: SessionToken) -> anyhow::Result<Option<ClientMessage>> {
        match self {
            MessageReader::Binary(read_half) => read_binary_message(read_half).await,
            MessageReader::Text(lines) => read_text_message(token, lines).await,
        }
    }
}

async fn read_binary_message(
    read_half: &mut OwnedReadHalf,
) -> anyhow::Result<Option<ClientMessage>> {
    loop {
        // Length prefix (u32 BE)
        let mut len_buf = [0u8; 4];
        match read_half.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let frame_len = u32::from_be_bytes(len_buf) as usize;
        if frame_len == 0 {
            continue;
        }
        if frame_len > MAX_FRAME_LEN {
            bail!("frame of {} bytes exceeds limit of {}", frame_len, MAX_FRAME_LEN);
        }

        let mut frame = vec![0u8; frame_len];
        read_half.read_exact(&mut frame).await.context("reading frame body")?;

        let msg = binary_codec::decode_client(&frame).context("decoding frame")?;
        return Ok(Some(msg));
    }
}

async fn read_text_message(
    token: SessionToken,
    lines: &mut BufReader<OwnedReadHalf>,
) -> anyhow::Result<Option<ClientMessage>> {
    let mut line = String::new();
    loop {
        line.clear();
        if lines.read_line(&mut line).await? == 0 {
            return Ok(None);
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match csv_codec::parse_client_line(trimmed) {
            Some(msg) => return Ok(Some(msg)),
            None => info!(session = %token, line = %trimmed, "invalid text line"),
        }
    }
}

/// Length-prefixed binary frame for `msg`.
fn encode_binary_frame(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    let mut payload = Vec::with_capacity(64);
    binary_codec::encode_server(msg, &mut payload)?;

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// The same name result with the name left out, so the controller still
/// gets its answer. `None` for anything that is not a name result.
fn without_name(msg: &ServerMessage) -> Option<ServerMessage> {
    match msg {
        ServerMessage::Reply(Reply::Name { worker_id, .. }) => {
            Some(ServerMessage::Reply(Reply::Name {
                worker_id: *worker_id,
                name: None,
            }))
        }
        ServerMessage::Command(_) => None,
    }
}

fn encode_text_line(msg: &ServerMessage) -> Vec<u8> {
    format!("{}\n", csv_codec::format_server_line(msg)).into_bytes()
}

async fn write_all_and_flush(stream: &mut OwnedWriteHalf, bytes: &[u8]) -> std::io::Result<()> {
    stream.write_all(bytes).await?;
    stream.flush().await
}

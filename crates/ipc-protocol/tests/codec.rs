// crates/ipc-protocol/tests/codec.rs
use ipc_core::{Command, Reply, Request, WorkerId};
use ipc_protocol::csv_codec::{
    format_client_line, format_server_line, parse_client_line, parse_server_line,
};
use ipc_protocol::wire_types::{MAX_NAME_LEN, PROTOCOL_VERSION};
use ipc_protocol::{
    decode_client, decode_server, encode_client, encode_server, ClientMessage, Hello,
    ProtocolError, ServerMessage,
};

fn encoded_client(msg: &ClientMessage) -> Vec<u8> {
    let mut out = Vec::new();
    encode_client(msg, &mut out).expect("encode");
    out
}

fn encoded_server(msg: &ServerMessage) -> Vec<u8> {
    let mut out = Vec::new();
    encode_server(msg, &mut out).expect("encode");
    out
}

#[test]
fn hello_layout() {
    let bytes = encoded_client(&ClientMessage::Hello(Hello::worker(WorkerId(3)).resume()));
    assert_eq!(bytes, vec![0, PROTOCOL_VERSION, 0, 0, 0b11, 0, 0, 0, 3]);

    let bytes = encoded_client(&ClientMessage::Hello(Hello::controller()));
    assert_eq!(bytes, vec![0, PROTOCOL_VERSION, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(
        decode_client(&bytes),
        Ok(ClientMessage::Hello(Hello {
            worker_id: None,
            resumed: false,
        }))
    );
}

#[test]
fn return_name_layout_and_decode() {
    let msg = ClientMessage::Request(Request::ReturnName {
        worker_id: WorkerId(2),
        name: "Client 2".into(),
    });
    let bytes = encoded_client(&msg);

    assert_eq!(&bytes[..4], &[3, PROTOCOL_VERSION, 0, 0]);
    assert_eq!(&bytes[4..8], &2u32.to_be_bytes());
    assert_eq!(&bytes[8..10], &8u16.to_be_bytes());
    assert_eq!(&bytes[10..], b"Client 2");
    assert_eq!(decode_client(&bytes), Ok(msg));
}

#[test]
fn name_result_with_and_without_name() {
    let found = ServerMessage::Reply(Reply::Name {
        worker_id: WorkerId(1),
        name: Some("Client 1".into()),
    });
    assert_eq!(decode_server(&encoded_server(&found)), Ok(found));

    let missing = ServerMessage::Reply(Reply::Name {
        worker_id: WorkerId(9),
        name: None,
    });
    let bytes = encoded_server(&missing);
    assert_eq!(bytes.len(), 11);
    assert_eq!(bytes[8], 0);
    assert_eq!(decode_server(&bytes), Ok(missing));
}

#[test]
fn commands_have_no_body() {
    assert_eq!(
        encoded_server(&ServerMessage::Command(Command::ShutDown)),
        vec![10, PROTOCOL_VERSION, 0, 0]
    );
    assert_eq!(
        decode_server(&[11, PROTOCOL_VERSION, 0, 0]),
        Ok(ServerMessage::Command(Command::GetName))
    );
}

#[test]
fn decode_errors() {
    assert_eq!(decode_client(&[1, PROTOCOL_VERSION]), Err(ProtocolError::Truncated));
    assert_eq!(
        decode_client(&[1, PROTOCOL_VERSION + 1, 0, 0]),
        Err(ProtocolError::VersionMismatch(PROTOCOL_VERSION + 1))
    );
    assert_eq!(
        decode_client(&[42, PROTOCOL_VERSION, 0, 0]),
        Err(ProtocolError::UnknownMessageType(42))
    );
    // GetName without its worker id
    assert_eq!(
        decode_client(&[2, PROTOCOL_VERSION, 0, 0, 0, 1]),
        Err(ProtocolError::Truncated)
    );
    // unknown hello flag
    assert_eq!(
        decode_client(&[0, PROTOCOL_VERSION, 0, 0, 0b100, 0, 0, 0, 0]),
        Err(ProtocolError::InvalidField("flags"))
    );
    // name claims more bytes than the frame has
    let mut frame = vec![3, PROTOCOL_VERSION, 0, 0, 0, 0, 0, 1];
    frame.extend_from_slice(&5u16.to_be_bytes());
    frame.extend_from_slice(b"abc");
    assert_eq!(decode_client(&frame), Err(ProtocolError::Truncated));
    // invalid UTF-8
    let mut frame = vec![3, PROTOCOL_VERSION, 0, 0, 0, 0, 0, 1];
    frame.extend_from_slice(&2u16.to_be_bytes());
    frame.extend_from_slice(&[0xff, 0xfe]);
    assert_eq!(decode_client(&frame), Err(ProtocolError::InvalidName));
}

#[test]
fn oversized_name_is_rejected_on_encode() {
    let msg = ClientMessage::Request(Request::ReturnName {
        worker_id: WorkerId(0),
        name: "x".repeat(MAX_NAME_LEN + 1),
    });
    let mut out = Vec::new();
    assert_eq!(encode_client(&msg, &mut out), Err(ProtocolError::InvalidName));
}

#[test]
fn text_client_lines() {
    assert_eq!(
        parse_client_line("H"),
        Some(ClientMessage::Hello(Hello::controller()))
    );
    assert_eq!(
        parse_client_line(" RH, 4 "),
        Some(ClientMessage::Hello(Hello::worker(WorkerId(4)).resume()))
    );
    assert_eq!(
        parse_client_line("G, 2"),
        Some(ClientMessage::Request(Request::GetName { worker_id: WorkerId(2) }))
    );
    // names may contain commas
    assert_eq!(
        parse_client_line("N, 2, Smith, Jane"),
        Some(ClientMessage::Request(Request::ReturnName {
            worker_id: WorkerId(2),
            name: "Smith, Jane".into(),
        }))
    );
    assert_eq!(parse_client_line("S"), Some(ClientMessage::Request(Request::ShutDown)));

    assert_eq!(parse_client_line(""), None);
    assert_eq!(parse_client_line("# comment"), None);
    assert_eq!(parse_client_line("G, -1"), None);
    assert_eq!(parse_client_line("S, 1"), None);
    assert_eq!(parse_client_line("X"), None);

    // the reply placeholder and anything the binary codec could not carry
    assert_eq!(parse_client_line("N, 2, -"), None);
    let too_long = format!("N, 2, {}", "x".repeat(MAX_NAME_LEN + 1));
    assert_eq!(parse_client_line(&too_long), None);
    let longest = format!("N, 2, {}", "x".repeat(MAX_NAME_LEN));
    assert!(parse_client_line(&longest).is_some());

    let msg = ClientMessage::Request(Request::ReturnName {
        worker_id: WorkerId(3),
        name: "Client 3".into(),
    });
    assert_eq!(format_client_line(&msg), "N, 3, Client 3");
    assert_eq!(parse_client_line(&format_client_line(&msg)), Some(msg));
}

#[test]
fn text_server_lines() {
    let missing = ServerMessage::Reply(Reply::Name {
        worker_id: WorkerId(5),
        name: None,
    });
    assert_eq!(format_server_line(&missing), "R, 5, -");
    assert_eq!(parse_server_line("R, 5, -"), Some(missing));

    assert_eq!(format_server_line(&ServerMessage::Command(Command::ShutDown)), "S");
    assert_eq!(
        parse_server_line("G"),
        Some(ServerMessage::Command(Command::GetName))
    );
    assert_eq!(
        parse_server_line("R, 1, Client 1"),
        Some(ServerMessage::Reply(Reply::Name {
            worker_id: WorkerId(1),
            name: Some("Client 1".into()),
        }))
    );
}

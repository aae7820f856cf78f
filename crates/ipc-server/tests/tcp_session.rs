// crates/ipc-server/tests/tcp_session.rs
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ipc_core::{Broker, Command, Reply, Request, Session, WorkerId};
use ipc_protocol::wire_types::{MAX_FRAME_LEN, MAX_NAME_LEN};
use ipc_protocol::{decode_server, encode_client, ClientMessage, Hello, ServerMessage};
use ipc_server::config::Config;
use ipc_server::Server;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

const IO_TIMEOUT: Duration = Duration::from_secs(2);

async fn start_server(reply_timeout: Duration) -> (SocketAddr, Arc<Broker>) {
    let config = Config {
        port: 0,
        reply_timeout,
        ..Config::default()
    };
    let server = Server::bind(&config).await.expect("bind");
    let addr = server.local_addr().expect("local addr");
    let broker = server.broker();
    tokio::spawn(server.run());
    (addr, broker)
}

async fn send(stream: &mut TcpStream, msg: ClientMessage) {
    let mut payload = Vec::new();
    encode_client(&msg, &mut payload).expect("encode");
    stream
        .write_all(&(payload.len() as u32).to_be_bytes())
        .await
        .unwrap();
    stream.write_all(&payload).await.unwrap();
}

async fn recv(stream: &mut TcpStream) -> ServerMessage {
    let mut len_buf = [0u8; 4];
    timeout(IO_TIMEOUT, stream.read_exact(&mut len_buf))
        .await
        .expect("timed out waiting for frame")
        .unwrap();
    let mut frame = vec![0u8; u32::from_be_bytes(len_buf) as usize];
    stream.read_exact(&mut frame).await.unwrap();
    decode_server(&frame).expect("decode")
}

async fn connect(addr: SocketAddr, hello: Hello) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    send(&mut stream, ClientMessage::Hello(hello)).await;
    stream
}

/// Wait until the broker has registered (or dropped) `id`.
async fn wait_for_worker(broker: &Broker, id: WorkerId, present: bool) {
    timeout(IO_TIMEOUT, async {
        while broker.registry().lookup(id).is_some() != present {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("registry did not settle");
}

#[tokio::test]
async fn get_name_round_trip_then_shutdown() {
    let (addr, broker) = start_server(Duration::from_secs(5)).await;

    let mut controller = connect(addr, Hello::controller()).await;
    let mut worker = connect(addr, Hello::worker(WorkerId(1))).await;
    wait_for_worker(&broker, WorkerId(1), true).await;

    send(
        &mut controller,
        ClientMessage::Request(Request::GetName { worker_id: WorkerId(1) }),
    )
    .await;

    assert_eq!(recv(&mut worker).await, ServerMessage::Command(Command::GetName));
    send(
        &mut worker,
        ClientMessage::Request(Request::ReturnName {
            worker_id: WorkerId(1),
            name: "Client 1".into(),
        }),
    )
    .await;

    assert_eq!(
        recv(&mut controller).await,
        ServerMessage::Reply(Reply::Name {
            worker_id: WorkerId(1),
            name: Some("Client 1".into()),
        })
    );

    send(&mut controller, ClientMessage::Request(Request::ShutDown)).await;
    assert_eq!(recv(&mut worker).await, ServerMessage::Command(Command::ShutDown));
    assert!(broker.is_shutdown());

    drop(worker);
    wait_for_worker(&broker, WorkerId(1), false).await;
}

#[tokio::test]
async fn unknown_worker_answers_immediately() {
    let (addr, _broker) = start_server(Duration::from_secs(5)).await;
    let mut controller = connect(addr, Hello::controller()).await;

    send(
        &mut controller,
        ClientMessage::Request(Request::GetName { worker_id: WorkerId(9) }),
    )
    .await;

    assert_eq!(
        recv(&mut controller).await,
        ServerMessage::Reply(Reply::Name {
            worker_id: WorkerId(9),
            name: None,
        })
    );
}

#[tokio::test]
async fn silent_worker_times_out() {
    let (addr, broker) = start_server(Duration::from_millis(200)).await;
    let mut controller = connect(addr, Hello::controller()).await;
    let mut worker = connect(addr, Hello::worker(WorkerId(2))).await;
    wait_for_worker(&broker, WorkerId(2), true).await;

    send(
        &mut controller,
        ClientMessage::Request(Request::GetName { worker_id: WorkerId(2) }),
    )
    .await;
    assert_eq!(recv(&mut worker).await, ServerMessage::Command(Command::GetName));

    assert_eq!(
        recv(&mut controller).await,
        ServerMessage::Reply(Reply::Name {
            worker_id: WorkerId(2),
            name: None,
        })
    );
}

#[tokio::test]
async fn controller_disconnect_shuts_workers_down() {
    let (addr, broker) = start_server(Duration::from_secs(5)).await;
    let controller = connect(addr, Hello::controller()).await;
    let mut worker = connect(addr, Hello::worker(WorkerId(0))).await;
    wait_for_worker(&broker, WorkerId(0), true).await;

    drop(controller);

    assert_eq!(recv(&mut worker).await, ServerMessage::Command(Command::ShutDown));
}

#[tokio::test]
async fn worker_cannot_order_shutdown() {
    let (addr, broker) = start_server(Duration::from_secs(5)).await;
    let mut worker = connect(addr, Hello::worker(WorkerId(3))).await;
    wait_for_worker(&broker, WorkerId(3), true).await;

    send(&mut worker, ClientMessage::Request(Request::ShutDown)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!broker.is_shutdown());
    assert!(broker.registry().lookup(WorkerId(3)).is_some());
}

#[tokio::test]
async fn text_worker_answers_binary_controller() {
    let (addr, broker) = start_server(Duration::from_secs(5)).await;
    let mut controller = connect(addr, Hello::controller()).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    write_half.write_all(b"H, 7\n").await.unwrap();
    wait_for_worker(&broker, WorkerId(7), true).await;

    send(
        &mut controller,
        ClientMessage::Request(Request::GetName { worker_id: WorkerId(7) }),
    )
    .await;

    let line = timeout(IO_TIMEOUT, lines.next_line())
        .await
        .expect("timed out waiting for line")
        .unwrap();
    assert_eq!(line.as_deref(), Some("G"));

    write_half.write_all(b"N, 7, seven\n").await.unwrap();

    assert_eq!(
        recv(&mut controller).await,
        ServerMessage::Reply(Reply::Name {
            worker_id: WorkerId(7),
            name: Some("seven".into()),
        })
    );
}

#[tokio::test]
async fn resumed_worker_replaces_old_session() {
    let (addr, broker) = start_server(Duration::from_secs(5)).await;
    let first = connect(addr, Hello::worker(WorkerId(4))).await;
    wait_for_worker(&broker, WorkerId(4), true).await;
    let old_token = broker.registry().lookup(WorkerId(4)).unwrap();

    let _second = connect(addr, Hello::worker(WorkerId(4)).resume()).await;
    timeout(IO_TIMEOUT, async {
        while broker.registry().lookup(WorkerId(4)) == Some(old_token) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("reconnect not applied");

    // the old session going away leaves the resumed one registered
    drop(first);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(broker.registry().lookup(WorkerId(4)).is_some());
    assert_ne!(broker.registry().lookup(WorkerId(4)), Some(old_token));
}

#[tokio::test]
async fn overlong_text_name_leaves_controller_session_working() {
    let (addr, broker) = start_server(Duration::from_millis(300)).await;
    let mut controller = connect(addr, Hello::controller()).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    write_half.write_all(b"H, 7\n").await.unwrap();
    wait_for_worker(&broker, WorkerId(7), true).await;

    send(
        &mut controller,
        ClientMessage::Request(Request::GetName { worker_id: WorkerId(7) }),
    )
    .await;
    let line = timeout(IO_TIMEOUT, lines.next_line())
        .await
        .expect("timed out waiting for line")
        .unwrap();
    assert_eq!(line.as_deref(), Some("G"));

    let reply = format!("N, 7, {}\n", "x".repeat(MAX_NAME_LEN + 44));
    write_half.write_all(reply.as_bytes()).await.unwrap();

    // the line is refused, so the request runs out its reply window
    assert_eq!(
        recv(&mut controller).await,
        ServerMessage::Reply(Reply::Name {
            worker_id: WorkerId(7),
            name: None,
        })
    );

    send(
        &mut controller,
        ClientMessage::Request(Request::GetName { worker_id: WorkerId(99) }),
    )
    .await;
    assert_eq!(
        recv(&mut controller).await,
        ServerMessage::Reply(Reply::Name {
            worker_id: WorkerId(99),
            name: None,
        })
    );
}

#[tokio::test]
async fn unencodable_name_is_answered_without_it() {
    let (addr, broker) = start_server(Duration::from_secs(5)).await;
    let mut controller = connect(addr, Hello::controller()).await;
    let mut worker = connect(addr, Hello::worker(WorkerId(8))).await;
    wait_for_worker(&broker, WorkerId(8), true).await;

    send(
        &mut controller,
        ClientMessage::Request(Request::GetName { worker_id: WorkerId(8) }),
    )
    .await;
    assert_eq!(recv(&mut worker).await, ServerMessage::Command(Command::GetName));

    // a name the binary codec cannot carry, handed to the broker directly
    let token = broker.registry().lookup(WorkerId(8)).unwrap();
    let answered = broker
        .return_name(
            &Session::worker(token, WorkerId(8)),
            WorkerId(8),
            "x".repeat(MAX_NAME_LEN + 1),
        )
        .unwrap();
    assert!(answered);

    assert_eq!(
        recv(&mut controller).await,
        ServerMessage::Reply(Reply::Name {
            worker_id: WorkerId(8),
            name: None,
        })
    );

    // the writer is still alive
    send(
        &mut controller,
        ClientMessage::Request(Request::GetName { worker_id: WorkerId(99) }),
    )
    .await;
    assert_eq!(
        recv(&mut controller).await,
        ServerMessage::Reply(Reply::Name {
            worker_id: WorkerId(99),
            name: None,
        })
    );
}

#[tokio::test]
async fn oversized_frame_closes_the_session() {
    let (addr, broker) = start_server(Duration::from_secs(5)).await;
    let mut worker = connect(addr, Hello::worker(WorkerId(5))).await;
    wait_for_worker(&broker, WorkerId(5), true).await;

    let bogus_len = (MAX_FRAME_LEN as u32 + 1).to_be_bytes();
    worker.write_all(&bogus_len).await.unwrap();

    wait_for_worker(&broker, WorkerId(5), false).await;
}

// crates/ipc-node/src/network.rs

use anyhow::Result;
use bytes::{Buf, BufMut, BytesMut};
use ipc_protocol::wire_types::MAX_FRAME_LEN;
use ipc_protocol::{binary_codec, ClientMessage, Hello, ServerMessage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Reconnect attempts before a connection gives up for good.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// A peer's connection to the broker, speaking the binary protocol.
///
/// The `Hello` it was created with is replayed on every (re)connect, so
/// the broker always sees the same identity for this process.
pub struct BrokerConnection {
    server_addr: String,
    hello: Hello,
    stream: Option<TcpStream>,
    read_buffer: BytesMut,
    write_buffer: BytesMut,
    reconnect_attempts: u32,
}

impl BrokerConnection {
    pub fn new(server_addr: &str, hello: Hello) -> Self {
        Self {
            server_addr: server_addr.to_string(),
            hello,
            stream: None,
            read_buffer: BytesMut::with_capacity(4096),
            write_buffer: BytesMut::with_capacity(4096),
            reconnect_attempts: 0,
        }
    }

    /// Open the connection and perform the handshake.
    pub async fn connect(&mut self) -> Result<()> {
        self.open(self.hello).await
    }

    async fn open(&mut self, hello: Hello) -> Result<()> {
        info!("Connecting to {}...", self.server_addr);

        match TcpStream::connect(&self.server_addr).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                self.stream = Some(stream);
                self.read_buffer.clear();
                self.send(ClientMessage::Hello(hello)).await?;
                self.reconnect_attempts = 0;
                info!("Connected successfully");
                Ok(())
            }
            Err(e) => {
                error!("Connection failed: {}", e);
                Err(e.into())
            }
        }
    }

    pub async fn send(&mut self, msg: ClientMessage) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Not connected"))?;

        // Encode message
        let mut payload = Vec::new();
        binary_codec::encode_client(&msg, &mut payload)?;

        // Add length prefix
        self.write_buffer.clear();
        self.write_buffer.put_u32(payload.len() as u32);
        self.write_buffer.extend_from_slice(&payload);

        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;

        debug!("Sent message: {:?}", msg);
        Ok(())
    }

    /// Next message from the broker; `None` once the broker closed the
    /// connection.
    pub async fn read_message(&mut self) -> Result<Option<ServerMessage>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Not connected"))?;

        // Read length prefix
        while self.read_buffer.len() < 4 {
            if stream.read_buf(&mut self.read_buffer).await? == 0 {
                return Ok(None);
            }
        }

        let len = u32::from_be_bytes([
            self.read_buffer[0],
            self.read_buffer[1],
            self.read_buffer[2],
            self.read_buffer[3],
        ]) as usize;
        if len > MAX_FRAME_LEN {
            anyhow::bail!("frame of {} bytes exceeds limit of {}", len, MAX_FRAME_LEN);
        }

        // Read message body
        while self.read_buffer.len() < 4 + len {
            if stream.read_buf(&mut self.read_buffer).await? == 0 {
                return Ok(None);
            }
        }

        self.read_buffer.advance(4);
        let frame = self.read_buffer.split_to(len);
        let msg = binary_codec::decode_server(&frame)?;

        debug!("Received from broker: {:?}", msg);
        Ok(Some(msg))
    }

    /// Re-establish a lost connection, announcing it as resumed.
    ///
    /// Backs off exponentially; fails after [`MAX_RECONNECT_ATTEMPTS`]
    /// consecutive failures.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.stream = None;

        loop {
            self.reconnect_attempts += 1;
            if self.reconnect_attempts > MAX_RECONNECT_ATTEMPTS {
                anyhow::bail!(
                    "giving up on {} after {} attempts",
                    self.server_addr,
                    MAX_RECONNECT_ATTEMPTS
                );
            }

            warn!(
                attempt = self.reconnect_attempts,
                "Connection lost, attempting to reconnect..."
            );

            // Exponential backoff
            let delay = Duration::from_millis(100 * 2_u64.pow(self.reconnect_attempts.min(5)));
            tokio::time::sleep(delay).await;

            if self.open(self.hello.resume()).await.is_ok() {
                info!("Reconnected successfully");
                return Ok(());
            }
        }
    }

    /// Close the connection; the broker sees a disconnect.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("Shutdown of connection failed: {}", e);
            }
        }
    }
}

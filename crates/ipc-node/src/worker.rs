//! Worker process: answers `GetName`, exits on `ShutDown`.

use anyhow::Result;
use ipc_core::{AgentAction, WorkerAgent, WorkerId};
use ipc_protocol::{ClientMessage, Hello, ServerMessage};
use tracing::{info, warn};

use crate::network::BrokerConnection;

/// Run a worker until the broker orders it to shut down.
///
/// Returns an error only if the broker cannot be reached at all, or the
/// connection is lost and cannot be re-established.
pub async fn run(server_addr: &str, id: WorkerId) -> Result<()> {
    let mut connection = BrokerConnection::new(server_addr, Hello::worker(id));
    connection.connect().await?;

    let mut agent = WorkerAgent::new(id);
    info!(worker = %id, "Connected to server");

    while !agent.is_terminated() {
        let msg = match connection.read_message().await {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                connection.reconnect().await?;
                continue;
            }
            Err(e) => {
                warn!(worker = %id, error = %e, "read failed");
                connection.reconnect().await?;
                continue;
            }
        };

        let command = match msg {
            ServerMessage::Command(command) => command,
            ServerMessage::Reply(reply) => {
                warn!(worker = %id, ?reply, "unexpected reply on a worker session");
                continue;
            }
        };

        match agent.handle(command) {
            AgentAction::Reply(request) => {
                info!(worker = %id, "Name requested by server");
                if let Err(e) = connection.send(ClientMessage::Request(request)).await {
                    warn!(worker = %id, error = %e, "reply not sent");
                }
            }
            AgentAction::Disconnect => {
                info!(worker = %id, "Shutdown order received");
                connection.close().await;
            }
            AgentAction::Ignore => {}
        }
    }

    Ok(())
}

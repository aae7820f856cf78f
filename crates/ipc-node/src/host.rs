//! Host process: runs the broker, connects to it as the controller and
//! drives a fleet of worker processes spawned from this same binary.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use ipc_core::{Reply, Request, WorkerId};
use ipc_protocol::{ClientMessage, Hello, ServerMessage};
use ipc_server::config::Config;
use ipc_server::Server;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::network::BrokerConnection;

pub struct HostOptions {
    pub server_addr: String,
    pub workers: u32,
    pub startup_delay: Duration,
    pub interactive: bool,
    pub debug: bool,
}

pub async fn run(opts: HostOptions) -> Result<()> {
    let addr: SocketAddr = opts
        .server_addr
        .parse()
        .with_context(|| format!("invalid server address {:?}", opts.server_addr))?;

    let mut config = Config::from_env()?;
    config.bind_addr = addr.ip().to_string();
    config.port = addr.port();
    let reply_timeout = config.reply_timeout;

    let server = Server::bind(&config).await?;
    let server_addr = server.local_addr()?.to_string();
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Server stopped: {}", e);
        }
    });

    let mut controller = BrokerConnection::new(&server_addr, Hello::controller());
    controller.connect().await?;

    let mut children = Vec::with_capacity(opts.workers as usize);
    for i in 0..opts.workers {
        println!("Starting client {}", i);
        children.push(spawn_worker(&server_addr, WorkerId(i), opts.debug)?);
    }

    tokio::time::sleep(opts.startup_delay).await;

    for i in 0..opts.workers {
        println!("Getting Name from client {}", i);
        // The broker answers within its own timeout; allow a little slack.
        let name = timeout(
            reply_timeout + Duration::from_secs(1),
            get_name(&mut controller, WorkerId(i)),
        )
        .await
        .context("broker did not answer GetName")??;
        println!("{}", name.as_deref().unwrap_or("<no answer>"));
    }

    if opts.interactive {
        prompt("Press enter to shutdown...").await?;
    }
    controller
        .send(ClientMessage::Request(Request::ShutDown))
        .await?;

    for (i, mut child) in children.into_iter().enumerate() {
        let status = child.wait().await?;
        debug!(worker = i, %status, "client exited");
    }
    info!("All clients exited");

    if opts.interactive {
        prompt("Press enter to exit...").await?;
    }
    controller.close().await;
    Ok(())
}

fn spawn_worker(server_addr: &str, id: WorkerId, debug: bool) -> Result<Child> {
    let exe = std::env::current_exe().context("locating own executable")?;

    let mut command = Command::new(exe);
    command
        .arg(id.to_string())
        .arg("--server")
        .arg(server_addr)
        .kill_on_drop(true);
    if debug {
        command.arg("--debug");
    }

    command
        .spawn()
        .with_context(|| format!("spawning client {}", id))
}

async fn get_name(controller: &mut BrokerConnection, id: WorkerId) -> Result<Option<String>> {
    controller
        .send(ClientMessage::Request(Request::GetName { worker_id: id }))
        .await?;

    loop {
        match controller.read_message().await? {
            Some(ServerMessage::Reply(Reply::Name { worker_id, name })) if worker_id == id => {
                return Ok(name);
            }
            Some(other) => debug!(?other, "ignoring message while waiting for name"),
            None => bail!("broker closed the controller connection"),
        }
    }
}

async fn prompt(text: &str) -> Result<()> {
    println!("{}", text);
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(())
}

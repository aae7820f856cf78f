// crates/ipc-node/src/main.rs

mod host;
mod network;
mod worker;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use ipc_core::WorkerId;
use tracing_subscriber::EnvFilter;

use crate::host::HostOptions;

#[derive(Parser)]
#[clap(name = "ipc-node")]
#[clap(about = "Broker host and worker processes")]
struct Cli {
    /// Run as the worker with this id; omit to run as the host
    worker_id: Option<u32>,

    /// Broker address (the host binds it, workers connect to it)
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Number of workers the host spawns
    #[clap(short, long, default_value = "4")]
    workers: u32,

    /// How long the host lets workers connect before querying them
    #[clap(long, default_value = "5000")]
    startup_delay_ms: u64,

    /// Do not wait for Enter before shutting down and exiting
    #[clap(long)]
    non_interactive: bool,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.worker_id {
        Some(id) => worker::run(&cli.server, WorkerId(id)).await,
        None => {
            host::run(HostOptions {
                server_addr: cli.server,
                workers: cli.workers,
                startup_delay: Duration::from_millis(cli.startup_delay_ms),
                interactive: !cli.non_interactive,
                debug: cli.debug,
            })
            .await
        }
    }
}

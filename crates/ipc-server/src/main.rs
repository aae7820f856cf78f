//! Standalone broker server (no workers spawned).

use ipc_server::config::Config;
use ipc_server::server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;

    info!(
        "Starting ipc-server on {}:{} (max_sessions = {}, reply_timeout = {:?})",
        config.bind_addr, config.port, config.max_sessions, config.reply_timeout
    );

    server::run(config).await
}

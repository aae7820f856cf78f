//! Configuration for the broker TCP server.
//!
//! Use defaults or override via environment variables:
//!
//! - `IPC_BIND_ADDR`        (default: "127.0.0.1")
//! - `IPC_PORT`             (default: "8080")
//! - `IPC_MAX_SESSIONS`     (default: "1024")
//! - `IPC_REPLY_TIMEOUT_MS` (default: "5000")

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use ipc_core::{BrokerConfig, DEFAULT_REPLY_TIMEOUT};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on; `0` picks a free port.
    pub port: u16,

    /// Maximum number of simultaneously connected sessions.
    pub max_sessions: usize,

    /// How long a controller's `GetName` waits for the worker.
    pub reply_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            max_sessions: 1024,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

impl Config {
    /// Construct a `Config` from environment variables, falling back
    /// to the defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        let bind_addr = env::var("IPC_BIND_ADDR").unwrap_or(defaults.bind_addr);
        let port = read_env_or_default("IPC_PORT", defaults.port)?;
        let max_sessions = read_env_or_default("IPC_MAX_SESSIONS", defaults.max_sessions)?;
        let reply_timeout_ms = read_env_or_default(
            "IPC_REPLY_TIMEOUT_MS",
            defaults.reply_timeout.as_millis() as u64,
        )?;

        Ok(Config {
            bind_addr,
            port,
            max_sessions,
            reply_timeout: Duration::from_millis(reply_timeout_ms),
        })
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            reply_timeout: self.reply_timeout,
        }
    }
}

fn read_env_or_default<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {:?}", key, val)),
        Err(_) => Ok(default),
    }
}

//! Broker façade.
//!
//! Binds incoming protocol events to the registry, the reply correlator
//! and the shutdown coordinator. One instance lives for the lifetime of
//! the hosting server and is shared by every session task as
//! `Arc<Broker>`.
//!
//! Role checks:
//! - `ShutDown`, `GetName`: controller only.
//! - `ReturnName`: worker only, and only for its own id.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::correlator::{RequestCorrelator, WaitOutcome};
use crate::error::BrokerError;
use crate::messages::{Command, MessageKind, Reply, Request};
use crate::registry::ConnectionRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::sink::CommandSink;
use crate::types::{Role, Session, WorkerId};

/// How long `GetName` waits for a worker's answer (5 s).
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Broker tuning.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Upper bound on a request/reply round trip.
    pub reply_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

pub struct Broker {
    registry: Arc<ConnectionRegistry>,
    correlator: RequestCorrelator<String>,
    shutdown: ShutdownCoordinator,
    sink: Arc<dyn CommandSink>,
}

impl Broker {
    pub fn new(sink: Arc<dyn CommandSink>) -> Self {
        Broker::with_config(sink, BrokerConfig::default())
    }

    pub fn with_config(sink: Arc<dyn CommandSink>, config: BrokerConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let shutdown = ShutdownCoordinator::new(registry.clone(), sink.clone());
        let correlator =
            RequestCorrelator::new(registry.clone(), shutdown.subscribe(), config.reply_timeout);

        Broker {
            registry,
            correlator,
            shutdown,
            sink,
        }
    }

    // -------------------------------------------------------------------------
    // Connection events
    // -------------------------------------------------------------------------

    pub fn on_connect(&self, session: &Session) {
        match session.role {
            Role::Controller => {
                info!(session = %session.token, "controller connected");
                if self.shutdown.reset() {
                    info!("shutdown flag cleared");
                }
            }
            Role::Worker(id) => {
                info!(worker = %id, session = %session.token, "worker connected");
                if let Some(previous) = self.registry.connect(id, session.token) {
                    debug!(worker = %id, replaced = %previous, "worker session replaced");
                }
            }
        }
    }

    /// The transport resumed a session after a transient failure.
    pub fn on_reconnect(&self, session: &Session) {
        match session.role {
            Role::Controller => {
                info!(session = %session.token, "controller reconnected");
                if self.shutdown.reset() {
                    info!("shutdown flag cleared");
                }
            }
            Role::Worker(id) => {
                info!(worker = %id, session = %session.token, "worker reconnected");
                self.registry.reconnect(id, session.token);
            }
        }
    }

    pub fn on_disconnect(&self, session: &Session) {
        match session.role {
            Role::Controller => {
                info!(session = %session.token, "controller disconnected");
                self.shutdown.broadcast_shutdown();
            }
            Role::Worker(id) => {
                if self.registry.disconnect(id, session.token) {
                    self.correlator.release(id);
                    info!(worker = %id, session = %session.token, "worker disconnected");
                } else {
                    debug!(worker = %id, session = %session.token, "stale session closed");
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Protocol operations
    // -------------------------------------------------------------------------

    /// Order every worker to shut down.
    ///
    /// Returns `Ok(false)` if a shutdown was already under way.
    pub fn shut_down(&self, caller: &Session) -> Result<bool, BrokerError> {
        if !caller.role.is_controller() {
            return Err(reject(MessageKind::ShutDown, caller));
        }
        info!("controller ordered shutdown");
        Ok(self.shutdown.broadcast_shutdown())
    }

    /// Ask `worker` for its name and wait for the answer.
    ///
    /// `Ok(None)` when the worker is not connected, does not answer in
    /// time, or a shutdown interrupts the wait.
    pub async fn get_name(
        &self,
        caller: &Session,
        worker: WorkerId,
    ) -> Result<Option<String>, BrokerError> {
        if !caller.role.is_controller() {
            return Err(reject(MessageKind::GetName, caller));
        }

        let sink = &self.sink;
        let outcome = self
            .correlator
            .request_and_wait(worker, |token| {
                if !sink.deliver(token, Command::GetName) {
                    debug!(worker = %worker, session = %token, "GetName not delivered");
                }
            })
            .await;

        match &outcome {
            WaitOutcome::Reply(name) => debug!(worker = %worker, name = %name, "name received"),
            WaitOutcome::UnknownWorker => info!(worker = %worker, "GetName for unknown worker"),
            WaitOutcome::Shutdown => info!(worker = %worker, "GetName interrupted by shutdown"),
            WaitOutcome::TimedOut => info!(worker = %worker, "GetName timed out"),
        }

        Ok(outcome.into_value())
    }

    /// A worker reporting its name.
    ///
    /// Returns `Ok(true)` if it answered a waiting `GetName`.
    pub fn return_name(
        &self,
        caller: &Session,
        worker: WorkerId,
        name: String,
    ) -> Result<bool, BrokerError> {
        let Role::Worker(authenticated) = caller.role else {
            return Err(reject(MessageKind::ReturnName, caller));
        };

        if self.registry.lookup(authenticated) != Some(caller.token) {
            let err = BrokerError::StaleSession {
                worker: authenticated,
                token: caller.token,
            };
            warn!(error = %err, "dropping reply");
            return Err(err);
        }

        match self.correlator.fulfill(authenticated, worker, name) {
            Ok(true) => Ok(true),
            Ok(false) => {
                debug!(worker = %worker, "no request waiting, reply dropped");
                Ok(false)
            }
            Err(err) => {
                warn!(error = %err, "dropping reply");
                Err(err)
            }
        }
    }

    /// Handle one request from `caller`.
    ///
    /// Rejections are logged by the operations themselves and never
    /// reach the transport as errors; a rejected `GetName` still gets an
    /// empty answer so the caller is not left waiting.
    pub async fn dispatch(&self, caller: &Session, request: Request) -> Option<Reply> {
        match request {
            Request::ShutDown => {
                self.shut_down(caller).ok();
                None
            }
            Request::GetName { worker_id } => {
                let name = self.get_name(caller, worker_id).await.unwrap_or_default();
                Some(Reply::Name { worker_id, name })
            }
            Request::ReturnName { worker_id, name } => {
                self.return_name(caller, worker_id, name).ok();
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_shutdown()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Number of `GetName` requests currently waiting for an answer.
    pub fn pending_requests(&self) -> usize {
        self.correlator.pending()
    }
}

fn reject(command: MessageKind, caller: &Session) -> BrokerError {
    let err = BrokerError::Unauthorized {
        command,
        role: caller.role,
    };
    warn!(session = %caller.token, error = %err, "rejected command");
    err
}

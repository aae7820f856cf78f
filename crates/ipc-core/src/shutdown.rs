//! Shutdown flag and the broadcast that goes with it.
//!
//! Both shutdown paths (an explicit `ShutDown` from the controller and
//! the controller's session dropping) go through
//! [`ShutdownCoordinator::broadcast_shutdown`], which only pushes the
//! command on the false → true transition of the flag. Workers therefore
//! see one `ShutDown` per shutdown episode whichever path fires first.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::messages::Command;
use crate::registry::ConnectionRegistry;
use crate::sink::CommandSink;

pub struct ShutdownCoordinator {
    flag: watch::Sender<bool>,
    registry: Arc<ConnectionRegistry>,
    sink: Arc<dyn CommandSink>,
}

impl ShutdownCoordinator {
    pub fn new(registry: Arc<ConnectionRegistry>, sink: Arc<dyn CommandSink>) -> Self {
        let (flag, _) = watch::channel(false);
        ShutdownCoordinator {
            flag,
            registry,
            sink,
        }
    }

    /// Raise the shutdown flag and push `ShutDown` to every worker.
    ///
    /// Returns `true` if this call started the episode. A call while the
    /// flag is already up sends nothing and returns `false`.
    pub fn broadcast_shutdown(&self) -> bool {
        let started = self.flag.send_if_modified(|flag| {
            if *flag {
                false
            } else {
                *flag = true;
                true
            }
        });

        if !started {
            debug!("shutdown already in progress, not re-broadcasting");
            return false;
        }

        let workers = self.registry.tokens();
        info!(workers = workers.len(), "broadcasting shutdown");
        for (id, token) in workers {
            if !self.sink.deliver(token, Command::ShutDown) {
                debug!(worker = %id, session = %token, "shutdown not delivered, session gone");
            }
        }
        true
    }

    pub fn is_shutdown(&self) -> bool {
        *self.flag.borrow()
    }

    /// Clear the flag for a new controller session.
    ///
    /// Returns `true` if the flag was set.
    pub fn reset(&self) -> bool {
        self.flag.send_if_modified(|flag| std::mem::replace(flag, false))
    }

    /// Receiver that observes every flag transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.flag.subscribe()
    }
}

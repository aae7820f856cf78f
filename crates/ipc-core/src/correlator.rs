//! Request/reply correlation over fire-and-forget commands.
//!
//! A request installs a single-use slot for its worker, pushes the
//! command, and suspends until one of:
//! - the worker's reply fills the slot,
//! - the shutdown flag goes up,
//! - the reply timeout (measured from the start of the request) elapses.
//!
//! There is one slot per worker. A second request for the same worker
//! replaces the first one's slot; the displaced request can no longer
//! be answered and ends at its own deadline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{oneshot, watch};
use tokio::time::{self, Instant};
use tracing::debug;

use crate::error::BrokerError;
use crate::registry::ConnectionRegistry;
use crate::types::{SessionToken, WorkerId};

/// How a [`RequestCorrelator::request_and_wait`] call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    /// The worker answered.
    Reply(T),
    /// The worker was not registered; nothing was sent.
    UnknownWorker,
    /// A shutdown interrupted the wait.
    Shutdown,
    /// No answer within the reply timeout.
    TimedOut,
}

impl<T> WaitOutcome<T> {
    /// Collapse to the caller-facing "value or no value".
    pub fn into_value(self) -> Option<T> {
        match self {
            WaitOutcome::Reply(value) => Some(value),
            _ => None,
        }
    }
}

/// Pending reply slot: the sending half of a oneshot, tagged with the
/// request that installed it so a finished request never clears a newer
/// request's slot.
struct PendingReply<T> {
    ticket: u64,
    tx: oneshot::Sender<T>,
}

pub struct RequestCorrelator<T> {
    slots: DashMap<WorkerId, PendingReply<T>>,
    next_ticket: AtomicU64,
    registry: Arc<ConnectionRegistry>,
    shutdown: watch::Receiver<bool>,
    timeout: Duration,
}

impl<T: Send> RequestCorrelator<T> {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        shutdown: watch::Receiver<bool>,
        timeout: Duration,
    ) -> Self {
        RequestCorrelator {
            slots: DashMap::new(),
            next_ticket: AtomicU64::new(0),
            registry,
            shutdown,
            timeout,
        }
    }

    /// Send a targeted command through `send` and wait for its reply.
    ///
    /// `send` is only invoked if `id` is registered, and receives the
    /// worker's current session token.
    pub async fn request_and_wait<F>(&self, id: WorkerId, send: F) -> WaitOutcome<T>
    where
        F: FnOnce(SessionToken),
    {
        let Some(token) = self.registry.lookup(id) else {
            return WaitOutcome::UnknownWorker;
        };

        let deadline = Instant::now() + self.timeout;
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        if self.slots.insert(id, PendingReply { ticket, tx }).is_some() {
            debug!(worker = %id, "replacing outstanding request");
        }

        send(token);

        let outcome = wait_for_reply(rx, self.shutdown.clone(), deadline).await;
        self.slots.remove_if(&id, |_, slot| slot.ticket == ticket);
        outcome
    }

    /// Deliver a reply sent by the worker session authenticated as
    /// `authenticated`, claiming to come from `claimed`.
    ///
    /// Returns `Ok(true)` if a waiting request received the value,
    /// `Ok(false)` if nothing was waiting (the reply is dropped).
    pub fn fulfill(
        &self,
        authenticated: WorkerId,
        claimed: WorkerId,
        value: T,
    ) -> Result<bool, BrokerError> {
        if claimed != authenticated {
            return Err(BrokerError::IdentityMismatch {
                claimed,
                authenticated,
            });
        }

        match self.slots.remove(&claimed) {
            Some((_, slot)) => Ok(slot.tx.send(value).is_ok()),
            None => Ok(false),
        }
    }

    /// Drop the slot for `id` without answering it.
    ///
    /// A request still waiting on it keeps waiting for shutdown or its
    /// deadline.
    pub fn release(&self, id: WorkerId) -> bool {
        self.slots.remove(&id).is_some()
    }

    /// Number of outstanding requests.
    pub fn pending(&self) -> usize {
        self.slots.len()
    }
}

async fn wait_for_reply<T>(
    mut rx: oneshot::Receiver<T>,
    mut shutdown: watch::Receiver<bool>,
    deadline: Instant,
) -> WaitOutcome<T> {
    let sleep = time::sleep_until(deadline);
    tokio::pin!(sleep);

    tokio::select! {
        reply = &mut rx => {
            if let Ok(value) = reply {
                return WaitOutcome::Reply(value);
            }
        }
        _ = shutdown_signalled(&mut shutdown) => return WaitOutcome::Shutdown,
        _ = &mut sleep => return WaitOutcome::TimedOut,
    }

    // Slot released or replaced: no reply can arrive any more.
    tokio::select! {
        _ = shutdown_signalled(&mut shutdown) => WaitOutcome::Shutdown,
        _ = &mut sleep => WaitOutcome::TimedOut,
    }
}

/// Resolves once the flag is up, or if the coordinator is gone.
async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|down| *down).await;
}

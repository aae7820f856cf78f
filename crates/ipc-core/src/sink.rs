//! The broker's view of the transport's send side.

use crate::messages::Command;
use crate::types::SessionToken;

/// Delivers commands to live sessions.
///
/// Implemented by the hosting transport. Delivery is fire-and-forget:
/// the broker never waits on it, and a `false` return only means the
/// session was already gone.
pub trait CommandSink: Send + Sync {
    fn deliver(&self, token: SessionToken, command: Command) -> bool;
}

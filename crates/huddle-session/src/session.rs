//! Session types: the relay's record of one live connection.

use std::time::{Duration, Instant};

use huddle_protocol::{PeerId, ServerEvent};
use tokio::sync::mpsc;

/// Channel sender for delivering outbound events to a connection task.
///
/// Unbounded so that enqueueing never waits: the registry lock is held while
/// notifications are enqueued, and a slow socket must not stall other rooms.
pub type PeerSender = mpsc::UnboundedSender<ServerEvent>;

/// Where a connection is in its lifecycle.
///
/// ```text
///   Attached ──(close / failure / idle timeout)──→ Detached
/// ```
///
/// `Detached` is terminal. A client that reconnects gets a new [`PeerId`]
/// and an empty set of rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The connection is live and can receive events.
    Attached,

    /// The connection is gone. `after` is how long it was attached.
    Detached { after: Duration },
}

/// A single connection's session.
#[derive(Debug)]
pub struct Session {
    /// The connection this session belongs to.
    pub peer_id: PeerId,

    /// Current lifecycle state.
    pub state: SessionState,

    /// When the session was attached.
    pub attached_at: Instant,

    pub(crate) outbox: PeerSender,
}

impl Session {
    pub(crate) fn attached(peer_id: PeerId, outbox: PeerSender) -> Self {
        Self {
            peer_id,
            state: SessionState::Attached,
            attached_at: Instant::now(),
            outbox,
        }
    }

    /// Moves the session to its terminal state.
    pub(crate) fn detach(mut self) -> Self {
        self.state = SessionState::Detached {
            after: self.attached_at.elapsed(),
        };
        self
    }

    /// Returns `true` while the session can receive events.
    pub fn is_attached(&self) -> bool {
        matches!(self.state, SessionState::Attached)
    }
}

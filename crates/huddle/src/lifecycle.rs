//! The hub: the one place where connection state and room state meet.
//!
//! Every inbound event for every connection funnels through [`Hub`]. It
//! owns the room registry and the session table, each behind its own
//! mutex, and always locks them in the same order (rooms, then sessions).
//! Outbound events produced by a registry change are pushed into the
//! recipients' outboxes before the rooms lock is released, so the order
//! peers observe matches the order the registry applied the changes.

use std::time::{Duration, Instant};

use huddle_protocol::{ClientEvent, PeerId, RoomId, ServerEvent};
use huddle_room::{RoomRegistry, relay};
use huddle_session::{PeerSender, SessionManager};
use tokio::sync::Mutex;

use crate::HuddleError;

/// Shared signaling state for all connections.
///
/// Transport-agnostic: anything that can assign unique [`PeerId`]s and
/// drain a [`PeerSender`] can drive it.
#[derive(Debug)]
pub struct Hub {
    rooms: Mutex<RoomRegistry>,
    sessions: Mutex<SessionManager>,
    started: Instant,
}

impl Hub {
    /// Creates a hub with no rooms and no sessions.
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(RoomRegistry::new()),
            sessions: Mutex::new(SessionManager::new()),
            started: Instant::now(),
        }
    }

    /// Registers a new connection and queues its `welcome`.
    ///
    /// # Errors
    /// Returns [`HuddleError::Session`] if `peer_id` is already attached.
    pub async fn attach(&self, peer_id: PeerId, outbox: PeerSender) -> Result<(), HuddleError> {
        let mut sessions = self.sessions.lock().await;
        sessions.attach(peer_id, outbox)?;
        sessions.deliver(peer_id, ServerEvent::Welcome { peer_id });
        Ok(())
    }

    /// Applies one inbound event from `peer_id`.
    ///
    /// Events from a peer that is not attached (for example, one racing its
    /// own disconnect) are ignored so they cannot leave stale memberships.
    pub async fn dispatch(&self, peer_id: PeerId, event: ClientEvent) {
        match event {
            ClientEvent::JoinRoom { room_id } => self.join(peer_id, room_id).await,
            ClientEvent::LeaveRoom { room_id } => self.leave(peer_id, &room_id).await,
            ClientEvent::Heartbeat { client_time } => {
                let server_time = saturating_millis(self.started.elapsed());
                self.sessions.lock().await.deliver(
                    peer_id,
                    ServerEvent::HeartbeatAck {
                        client_time,
                        server_time,
                    },
                );
            }
            signal => {
                let Some(signal) = signal.into_signal() else {
                    return;
                };
                let rooms = self.rooms.lock().await;
                let sessions = self.sessions.lock().await;
                if !sessions.is_attached(&peer_id) {
                    return;
                }
                sessions.deliver_all(relay(&rooms, peer_id, signal));
            }
        }
    }

    async fn join(&self, peer_id: PeerId, room_id: RoomId) {
        let mut rooms = self.rooms.lock().await;
        let sessions = self.sessions.lock().await;
        if !sessions.is_attached(&peer_id) {
            tracing::debug!(%peer_id, %room_id, "ignoring join from detached peer");
            return;
        }
        let joined = rooms.join(peer_id, room_id);
        sessions.deliver_all(joined.outbound);
    }

    async fn leave(&self, peer_id: PeerId, room_id: &RoomId) {
        let mut rooms = self.rooms.lock().await;
        let sessions = self.sessions.lock().await;
        sessions.deliver_all(rooms.leave(peer_id, room_id));
    }

    /// Tears down a connection: ends its session, removes it from every
    /// room, and tells the peers it shared rooms with.
    ///
    /// Returns `false` without doing anything if the peer was already
    /// detached, so concurrent or repeated calls clean up exactly once.
    pub async fn detach(&self, peer_id: PeerId) -> bool {
        let mut rooms = self.rooms.lock().await;
        let mut sessions = self.sessions.lock().await;
        if sessions.detach(peer_id).is_err() {
            return false;
        }
        let left = rooms.rooms_of(&peer_id).len();
        let delivered = sessions.deliver_all(rooms.remove_connection(peer_id));
        tracing::info!(
            %peer_id,
            rooms_left = left,
            notified = delivered,
            "peer detached"
        );
        true
    }

    /// Current members of a room.
    pub async fn members(&self, room_id: &RoomId) -> Vec<PeerId> {
        self.rooms.lock().await.members(room_id)
    }

    /// Rooms a peer currently belongs to.
    pub async fn rooms_of(&self, peer_id: &PeerId) -> Vec<RoomId> {
        self.rooms.lock().await.rooms_of(peer_id)
    }

    /// Number of non-empty rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.room_count()
    }

    /// Number of attached connections.
    pub async fn peer_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Milliseconds in `elapsed`, pinned at `u64::MAX` instead of wrapping.
fn saturating_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

//! The session manager: tracks every attached connection and its outbox.
//!
//! # Concurrency note
//!
//! `SessionManager` is a plain `HashMap` with no locking of its own. The
//! lifecycle layer owns it behind a mutex and always takes the room
//! registry's lock first, so deliveries happen in the same order as the
//! membership changes that produced them.

use std::collections::HashMap;

use huddle_protocol::{Outbound, PeerId, ServerEvent};

use crate::{PeerSender, Session, SessionError};

/// Manages all attached sessions.
///
/// ## Lifecycle
///
/// ```text
/// accept ──→ attach() ──→ deliver()* ──→ detach()
///               │                           │
///               ▼                           ▼
///           [Attached]                 [Detached] (removed)
/// ```
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: HashMap<PeerId, Session>,
}

impl SessionManager {
    /// Creates a new, empty session manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly accepted connection.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyAttached`] if the id is already live.
    pub fn attach(
        &mut self,
        peer_id: PeerId,
        outbox: PeerSender,
    ) -> Result<&Session, SessionError> {
        if self.sessions.contains_key(&peer_id) {
            return Err(SessionError::AlreadyAttached(peer_id));
        }
        tracing::info!(%peer_id, sessions = self.sessions.len() + 1, "session attached");
        Ok(self
            .sessions
            .entry(peer_id)
            .or_insert_with(|| Session::attached(peer_id, outbox)))
    }

    /// Removes a session and returns it in the `Detached` state.
    ///
    /// Only the first call for a given peer succeeds, which is what lets the
    /// lifecycle layer run room cleanup exactly once.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if the peer is not attached.
    pub fn detach(&mut self, peer_id: PeerId) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .remove(&peer_id)
            .ok_or(SessionError::NotFound(peer_id))?
            .detach();
        tracing::info!(
            %peer_id,
            state = ?session.state,
            sessions = self.sessions.len(),
            "session detached"
        );
        Ok(session)
    }

    /// Hands one event to a peer's outbox.
    ///
    /// Best effort: returns `false` if the peer is gone or its connection
    /// task has already stopped reading.
    pub fn deliver(&self, to: PeerId, event: ServerEvent) -> bool {
        let Some(session) = self.sessions.get(&to) else {
            tracing::trace!(peer_id = %to, "dropping event for unknown peer");
            return false;
        };
        if session.outbox.send(event).is_err() {
            tracing::trace!(peer_id = %to, "dropping event, outbox closed");
            return false;
        }
        true
    }

    /// Delivers a batch of addressed events in order. Returns how many
    /// reached an outbox.
    pub fn deliver_all(&self, outbound: impl IntoIterator<Item = Outbound>) -> usize {
        outbound
            .into_iter()
            .map(|out| self.deliver(out.to, out.event))
            .filter(|delivered| *delivered)
            .count()
    }

    /// Looks up an attached session.
    pub fn get(&self, peer_id: &PeerId) -> Option<&Session> {
        self.sessions.get(peer_id)
    }

    /// Returns `true` if the peer is currently attached.
    pub fn is_attached(&self, peer_id: &PeerId) -> bool {
        self.sessions.contains_key(peer_id)
    }

    /// Returns the number of attached sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if nobody is attached.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use huddle_protocol::RoomId;
    use tokio::sync::mpsc;

    use super::*;
    use crate::SessionState;

    fn pid(id: u64) -> PeerId {
        PeerId(id)
    }

    fn peer_joined(room: &str, peer: u64) -> ServerEvent {
        ServerEvent::PeerJoined {
            room_id: RoomId::from(room),
            peer_id: pid(peer),
        }
    }

    // =====================================================================
    // attach() / detach()
    // =====================================================================

    #[test]
    fn test_attach_new_peer_is_attached() {
        let mut mgr = SessionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let session = mgr.attach(pid(1), tx).expect("should attach");
        assert_eq!(session.peer_id, pid(1));
        assert!(session.is_attached());
        assert!(mgr.is_attached(&pid(1)));
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn test_attach_twice_returns_already_attached() {
        let mut mgr = SessionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        mgr.attach(pid(1), tx.clone()).unwrap();

        let result = mgr.attach(pid(1), tx);
        assert!(matches!(result, Err(SessionError::AlreadyAttached(p)) if p == pid(1)));
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn test_detach_returns_detached_session_once() {
        let mut mgr = SessionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        mgr.attach(pid(1), tx).unwrap();

        let session = mgr.detach(pid(1)).expect("first detach succeeds");
        assert!(matches!(session.state, SessionState::Detached { .. }));
        assert!(!session.is_attached());
        assert!(mgr.is_empty());

        let again = mgr.detach(pid(1));
        assert!(matches!(again, Err(SessionError::NotFound(p)) if p == pid(1)));
    }

    #[test]
    fn test_detach_unknown_peer_returns_not_found() {
        let mut mgr = SessionManager::new();
        assert!(matches!(mgr.detach(pid(9)), Err(SessionError::NotFound(_))));
    }

    // =====================================================================
    // deliver()
    // =====================================================================

    #[test]
    fn test_deliver_reaches_outbox() {
        let mut mgr = SessionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        mgr.attach(pid(1), tx).unwrap();

        assert!(mgr.deliver(pid(1), peer_joined("x", 2)));
        assert_eq!(rx.try_recv().unwrap(), peer_joined("x", 2));
    }

    #[test]
    fn test_deliver_to_unknown_peer_is_noop() {
        let mgr = SessionManager::new();
        assert!(!mgr.deliver(pid(5), peer_joined("x", 2)));
    }

    #[test]
    fn test_deliver_after_receiver_dropped_returns_false() {
        let mut mgr = SessionManager::new();
        let (tx, rx) = mpsc::unbounded_channel();
        mgr.attach(pid(1), tx).unwrap();
        drop(rx);

        assert!(!mgr.deliver(pid(1), peer_joined("x", 2)));
    }

    #[test]
    fn test_deliver_all_preserves_order_and_skips_missing() {
        let mut mgr = SessionManager::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        mgr.attach(pid(1), tx1).unwrap();
        mgr.attach(pid(2), tx2).unwrap();

        let delivered = mgr.deliver_all(vec![
            Outbound::new(pid(1), peer_joined("a", 3)),
            Outbound::new(pid(7), peer_joined("a", 3)),
            Outbound::new(pid(1), peer_joined("b", 3)),
            Outbound::new(pid(2), peer_joined("a", 3)),
        ]);

        assert_eq!(delivered, 3);
        assert_eq!(rx1.try_recv().unwrap(), peer_joined("a", 3));
        assert_eq!(rx1.try_recv().unwrap(), peer_joined("b", 3));
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), peer_joined("a", 3));
    }

    #[test]
    fn test_detached_peer_no_longer_receives() {
        let mut mgr = SessionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        mgr.attach(pid(1), tx).unwrap();
        mgr.detach(pid(1)).unwrap();

        assert!(!mgr.deliver(pid(1), peer_joined("x", 2)));
        assert!(rx.try_recv().is_err());
    }
}

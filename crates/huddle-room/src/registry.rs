//! The room registry: who is in which room.
//!
//! Two maps are kept in lockstep:
//!
//! - `rooms`: room → members, the primary index used for snapshots and
//!   fan-out.
//! - `peer_rooms`: peer → rooms, the reverse index that lets a disconnect
//!   find its rooms without scanning every room.
//!
//! Both use ordered sets so snapshots and notification order are
//! deterministic.

use std::collections::{BTreeSet, HashMap};

use huddle_protocol::{Outbound, PeerId, RoomId, ServerEvent};

/// The result of [`RoomRegistry::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    /// Members of the room immediately before the join, excluding the
    /// joining peer.
    pub snapshot: Vec<PeerId>,

    /// `members` for the joiner first, then one `peer-joined` per
    /// snapshot member. A re-join only carries the `members` event.
    pub outbound: Vec<Outbound>,

    /// `false` when the peer was already a member.
    pub changed: bool,
}

/// Tracks room membership for every live connection.
///
/// Invariants, held after every public call:
///
/// - a room key is present iff its member set is non-empty;
/// - a peer key in the reverse index is present iff it is in at least
///   one room;
/// - `p ∈ rooms[r]` iff `r ∈ peer_rooms[p]`.
///
/// Every operation is total. Unknown rooms and unknown peers are simply
/// "nothing to do".
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, BTreeSet<PeerId>>,
    peer_rooms: HashMap<PeerId, BTreeSet<RoomId>>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `peer` to `room`, creating the room if needed.
    pub fn join(&mut self, peer: PeerId, room: RoomId) -> Joined {
        let members = self.rooms.entry(room.clone()).or_default();
        let snapshot: Vec<PeerId> = members.iter().copied().filter(|m| *m != peer).collect();
        let changed = members.insert(peer);
        let created = changed && members.len() == 1;
        self.peer_rooms.entry(peer).or_default().insert(room.clone());

        if created {
            tracing::info!(room_id = %room, "room created");
        }
        tracing::debug!(
            room_id = %room,
            peer_id = %peer,
            members = snapshot.len() + 1,
            rejoin = !changed,
            "peer joined room"
        );

        let mut outbound = Vec::with_capacity(snapshot.len() + 1);
        outbound.push(Outbound::new(
            peer,
            ServerEvent::Members {
                room_id: room.clone(),
                members: snapshot.clone(),
            },
        ));
        if changed {
            outbound.extend(snapshot.iter().map(|member| {
                Outbound::new(
                    *member,
                    ServerEvent::PeerJoined {
                        room_id: room.clone(),
                        peer_id: peer,
                    },
                )
            }));
        }

        Joined {
            snapshot,
            outbound,
            changed,
        }
    }

    /// Removes `peer` from `room` and tells the remaining members.
    ///
    /// Leaving a room the peer is not in returns no events.
    pub fn leave(&mut self, peer: PeerId, room: &RoomId) -> Vec<Outbound> {
        let removed = match self.peer_rooms.get_mut(&peer) {
            Some(rooms) => {
                let removed = rooms.remove(room);
                if rooms.is_empty() {
                    self.peer_rooms.remove(&peer);
                }
                removed
            }
            None => false,
        };
        if !removed {
            return Vec::new();
        }
        self.remove_member(peer, room)
    }

    /// Removes `peer` from every room it is in. Used when a connection
    /// goes away.
    ///
    /// Each affected room is visited once, so each remaining member gets
    /// exactly one `peer-left` per shared room.
    pub fn remove_connection(&mut self, peer: PeerId) -> Vec<Outbound> {
        let Some(rooms) = self.peer_rooms.remove(&peer) else {
            return Vec::new();
        };
        let mut outbound = Vec::new();
        for room in &rooms {
            outbound.extend(self.remove_member(peer, room));
        }
        tracing::debug!(peer_id = %peer, rooms = rooms.len(), "connection removed from rooms");
        outbound
    }

    /// Drops `peer` from the primary index and builds the `peer-left`
    /// fan-out. The caller has already updated the reverse index.
    fn remove_member(&mut self, peer: PeerId, room: &RoomId) -> Vec<Outbound> {
        let Some(members) = self.rooms.get_mut(room) else {
            return Vec::new();
        };
        members.remove(&peer);

        let outbound = members
            .iter()
            .map(|member| {
                Outbound::new(
                    *member,
                    ServerEvent::PeerLeft {
                        room_id: room.clone(),
                        peer_id: peer,
                    },
                )
            })
            .collect();

        if members.is_empty() {
            self.rooms.remove(room);
            tracing::info!(room_id = %room, "room deleted");
        }
        tracing::debug!(room_id = %room, peer_id = %peer, "peer left room");
        outbound
    }

    /// Current members of `room`, in id order. Empty for unknown rooms.
    pub fn members(&self, room: &RoomId) -> Vec<PeerId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Rooms `peer` currently belongs to, in key order.
    pub fn rooms_of(&self, peer: &PeerId) -> Vec<RoomId> {
        self.peer_rooms
            .get(peer)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns `true` if `peer` is a member of `room`.
    pub fn is_member(&self, peer: &PeerId, room: &RoomId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains(peer))
    }

    /// Returns `true` if the room currently exists (has members).
    pub fn contains_room(&self, room: &RoomId) -> bool {
        self.rooms.contains_key(room)
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of peers that are in at least one room.
    pub fn peer_count(&self) -> usize {
        self.peer_rooms.len()
    }

    /// Iterates over the members of a room without allocating.
    pub(crate) fn members_iter<'a>(&'a self, room: &RoomId) -> impl Iterator<Item = PeerId> + 'a {
        self.rooms
            .get(room)
            .into_iter()
            .flat_map(|members| members.iter().copied())
    }
}

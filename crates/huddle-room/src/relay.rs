//! Signal routing.
//!
//! The relay is a pure function of the registry's current membership and
//! the incoming [`Signal`]. It stamps the sender's id on the payload and
//! picks recipients; it never inspects the payload and never keeps it.

use huddle_protocol::{Outbound, PeerId, ServerEvent, Signal, Target};

use crate::RoomRegistry;

/// Routes `signal` from `sender` and returns the events to deliver.
///
/// - [`Target::Peer`] goes to that peer only, whether or not the two
///   share a room.
/// - [`Target::Room`] goes to every current member except `sender`.
/// - No target: the signal is dropped and nothing is returned.
pub fn relay(registry: &RoomRegistry, sender: PeerId, signal: Signal) -> Vec<Outbound> {
    let Signal {
        kind,
        payload,
        target,
    } = signal;

    match target {
        Some(Target::Peer(to)) => {
            tracing::trace!(%sender, %to, %kind, "relaying to peer");
            vec![Outbound::new(to, ServerEvent::signal(kind, sender, payload))]
        }
        Some(Target::Room(room)) => {
            let outbound: Vec<Outbound> = registry
                .members_iter(&room)
                .filter(|member| *member != sender)
                .map(|member| {
                    Outbound::new(member, ServerEvent::signal(kind, sender, payload.clone()))
                })
                .collect();
            tracing::trace!(
                %sender,
                room_id = %room,
                %kind,
                recipients = outbound.len(),
                "relaying to room"
            );
            outbound
        }
        None => {
            tracing::debug!(%sender, %kind, "dropping signal without destination");
            Vec::new()
        }
    }
}

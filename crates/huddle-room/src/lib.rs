//! Room membership and message routing for Huddle.
//!
//! Rooms are plain sets of [`PeerId`]s keyed by a caller-chosen
//! [`RoomId`]. There is no room object with its own task: a room exists
//! exactly while it has members, and all state lives in one
//! [`RoomRegistry`] that the server guards with a single lock.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: join / leave / remove-connection, with the
//!   notifications each change produces
//! - [`Joined`]: the snapshot and notifications returned by a join
//! - [`relay`]: routes a [`Signal`] to a peer or to a room
//!
//! Nothing here sends anything. Every operation returns the
//! [`Outbound`] events it implies and the caller delivers them.
//!
//! [`PeerId`]: huddle_protocol::PeerId
//! [`RoomId`]: huddle_protocol::RoomId
//! [`Signal`]: huddle_protocol::Signal
//! [`Outbound`]: huddle_protocol::Outbound

mod registry;
mod relay;

pub use registry::{Joined, RoomRegistry};
pub use relay::relay;

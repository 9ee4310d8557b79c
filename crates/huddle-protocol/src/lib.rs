//! Wire protocol for the Huddle signaling relay.
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`PeerId`], [`RoomId`],
//!   [`Blob`]): what travels over the socket.
//! - **Routing** ([`Signal`], [`Target`], [`Outbound`]): the relay's view
//!   of a signaling message and of an addressed reply.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, events out.
//!
//! ```text
//! Transport (frames) → Protocol (events) → Registry / Relay (outbound)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    Blob, ClientEvent, Outbound, PeerId, RoomId, ServerEvent, Signal, SignalKind, Target,
};

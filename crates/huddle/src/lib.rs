//! # Huddle
//!
//! A WebRTC signaling relay. Clients join named rooms, learn who else is
//! there, and exchange offers, answers and ICE candidates through the relay
//! until they can talk to each other directly. The relay never sees media
//! and never stores anything: all state lives in memory and is rebuilt by
//! clients rejoining.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use huddle::prelude::*;
//!
//! # async fn run() -> Result<(), HuddleError> {
//! let server = HuddleServer::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod lifecycle;
mod server;

pub use config::{BIND_ADDR_ENV, HANDSHAKE_TIMEOUT_ENV, IDLE_TIMEOUT_ENV, ServerConfig};
pub use error::HuddleError;
pub use lifecycle::Hub;
pub use server::{HuddleServer, HuddleServerBuilder};

/// Convenience re-exports of the types most users need.
pub mod prelude {
    pub use crate::{HuddleError, HuddleServer, HuddleServerBuilder, Hub, ServerConfig};
    pub use huddle_protocol::{
        Blob, ClientEvent, Codec, JsonCodec, PeerId, RoomId, ServerEvent,
    };
}

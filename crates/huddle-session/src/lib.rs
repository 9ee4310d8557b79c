//! Session bookkeeping for Huddle.
//!
//! A session is the relay's record of one live connection: its [`PeerId`]
//! and the outbox its connection task drains. The [`SessionManager`] is the
//! only place that knows how to reach a peer, so every registry or relay
//! result flows through [`SessionManager::deliver_all`].
//!
//! ```text
//! Lifecycle (above)  ← attaches on accept, detaches on close/failure
//!     ↕
//! Session Layer (this crate)  ← who is attached, and their outboxes
//!     ↕
//! Protocol Layer (below)  ← PeerId, ServerEvent, Outbound
//! ```
//!
//! [`PeerId`]: huddle_protocol::PeerId

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{PeerSender, Session, SessionState};

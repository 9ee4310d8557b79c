//! Error types for the session layer.

use huddle_protocol::PeerId;

/// Errors that can occur while attaching or detaching sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No attached session exists for the peer. Either it never attached
    /// or it has already been detached.
    #[error("no session for {0}")]
    NotFound(PeerId),

    /// A session with this id is already attached. Connection ids are never
    /// reused, so this points at a transport bug.
    #[error("{0} is already attached")]
    AlreadyAttached(PeerId),
}

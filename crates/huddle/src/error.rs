//! Unified error type for the Huddle server.

use std::net::SocketAddr;

use huddle_protocol::ProtocolError;
use huddle_session::SessionError;
use huddle_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The room registry and relay have no error type: they are defined for
/// every state. What can fail is the socket, the framing, session
/// bookkeeping, and reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (double attach).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A client opened a socket but did not finish the WebSocket upgrade
    /// in time.
    #[error("handshake with {0} timed out")]
    HandshakeTimeout(SocketAddr),

    /// An environment variable held a value that could not be used.
    #[error("invalid configuration: {0}")]
    Config(String),
}

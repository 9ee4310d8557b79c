//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means a frame could not be turned into (or
//! produced from) a wire event. It never describes routing problems: the
//! relay treats those as silent no-ops.

/// Errors that can occur while encoding or decoding wire events.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown event name, or a
    /// missing required field such as `sdp`.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}

//! Wire types for the Huddle signaling protocol.
//!
//! Every frame is a JSON object of the form
//! `{ "event": "<kebab-case name>", "data": { ...camelCase fields } }`.
//! [`ClientEvent`] is what clients send, [`ServerEvent`] is what the relay
//! sends back. The signaling payloads themselves (`sdp`, `candidate`) are
//! carried as [`Blob`]s that the relay never looks into.

use std::fmt;

use huddle_transport::ConnectionId;
use serde::de::{self, DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The wire-visible identity of one connection.
///
/// A `PeerId` is derived from the transport's [`ConnectionId`], so it is
/// unique for as long as the process runs. It serializes as a plain JSON
/// number: `PeerId(7)` is just `7` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u64);

impl From<ConnectionId> for PeerId {
    fn from(id: ConnectionId) -> Self {
        Self(id.into_inner())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// A caller-chosen room key, e.g. `"movie-night"`.
///
/// Rooms are not created ahead of time. Any string is a valid key and the
/// room exists exactly while somebody is in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Opaque payloads
// ---------------------------------------------------------------------------

/// An opaque negotiation payload (an SDP description or an ICE candidate).
///
/// Clients may send a string or a whole JSON object here. The text is kept
/// exactly as it arrived and written back out unchanged: no number
/// rounding, no key reordering. Nothing in the relay reads the contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Blob(Box<RawValue>);

impl Blob {
    /// Wraps a JSON document. The text is validated but otherwise kept
    /// byte for byte.
    ///
    /// # Errors
    /// Returns the parse error if `text` is not a single JSON value.
    pub fn from_json(text: impl Into<String>) -> Result<Self, serde_json::Error> {
        RawValue::from_string(text.into()).map(Self)
    }

    /// Serializes `value` into a blob.
    ///
    /// # Errors
    /// Returns the serializer's error, e.g. for a map with non-string keys.
    pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::value::to_raw_value(value).map(Self)
    }

    /// The payload's JSON text, as received.
    pub fn as_str(&self) -> &str {
        self.0.get()
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Blob {}

// ---------------------------------------------------------------------------
// Signaling
// ---------------------------------------------------------------------------

/// The three kinds of negotiation message the relay carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    /// The event name used on the wire for this kind.
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Offer => "signal-offer",
            Self::Answer => "signal-answer",
            Self::IceCandidate => "signal-ice",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

/// Where a signaling message should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Exactly one connection, whatever rooms it is in.
    Peer(PeerId),
    /// Every current member of the room except the sender.
    Room(RoomId),
}

impl Target {
    /// Picks the routing target from a client's optional `to` and `roomId`.
    ///
    /// `to` wins when both are present. `None` means the message has no
    /// destination and should be dropped.
    pub fn resolve(to: Option<PeerId>, room_id: Option<RoomId>) -> Option<Self> {
        match (to, room_id) {
            (Some(peer), _) => Some(Self::Peer(peer)),
            (None, Some(room)) => Some(Self::Room(room)),
            (None, None) => None,
        }
    }
}

/// A kind-tagged signaling message as the relay sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub kind: SignalKind,
    pub payload: Blob,
    pub target: Option<Target>,
}

impl Signal {
    /// Builds a signal from the raw routing fields of a client event.
    pub fn new(
        kind: SignalKind,
        payload: Blob,
        to: Option<PeerId>,
        room_id: Option<RoomId>,
    ) -> Self {
        Self {
            kind,
            payload,
            target: Target::resolve(to, room_id),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Events a client sends to the relay.
///
/// Adjacently tagged: `{"event": "join-room", "data": {"roomId": "x"}}`.
///
/// Decoding is done by hand so that `sdp` and `candidate` can stay raw
/// whatever order the client wrote `event` and `data` in. It therefore
/// needs a `serde_json` text deserializer (`from_str`, `from_slice`);
/// `serde_json::from_value` cannot produce raw payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Enter a room and learn who is already there.
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: RoomId },

    /// Leave a room. Leaving a room you are not in does nothing.
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: RoomId },

    /// Forward an SDP offer to `to`, or to everyone else in `roomId`.
    #[serde(rename_all = "camelCase")]
    SignalOffer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
        sdp: Blob,
    },

    /// Forward an SDP answer. Same routing rules as an offer.
    #[serde(rename_all = "camelCase")]
    SignalAnswer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
        sdp: Blob,
    },

    /// Forward a network-path candidate. Same routing rules as an offer.
    #[serde(rename_all = "camelCase")]
    SignalIce {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
        candidate: Blob,
    },

    /// Keep-alive. `clientTime` is echoed back for RTT measurement.
    #[serde(rename_all = "camelCase")]
    Heartbeat { client_time: u64 },
}

impl ClientEvent {
    /// Returns the signaling view of this event, or `None` for membership
    /// and keep-alive events.
    pub fn into_signal(self) -> Option<Signal> {
        match self {
            Self::SignalOffer { room_id, to, sdp } => {
                Some(Signal::new(SignalKind::Offer, sdp, to, room_id))
            }
            Self::SignalAnswer { room_id, to, sdp } => {
                Some(Signal::new(SignalKind::Answer, sdp, to, room_id))
            }
            Self::SignalIce {
                room_id,
                to,
                candidate,
            } => Some(Signal::new(SignalKind::IceCandidate, candidate, to, room_id)),
            Self::JoinRoom { .. } | Self::LeaveRoom { .. } | Self::Heartbeat { .. } => None,
        }
    }
}

const CLIENT_EVENTS: &[&str] = &[
    "join-room",
    "leave-room",
    "signal-offer",
    "signal-answer",
    "signal-ice",
    "heartbeat",
];

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Option<Box<RawValue>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomData {
    room_id: RoomId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SdpData {
    #[serde(default)]
    room_id: Option<RoomId>,
    #[serde(default)]
    to: Option<PeerId>,
    sdp: Blob,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IceData {
    #[serde(default)]
    room_id: Option<RoomId>,
    #[serde(default)]
    to: Option<PeerId>,
    candidate: Blob,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatData {
    client_time: u64,
}

fn parse_data<T: DeserializeOwned>(data: &str) -> serde_json::Result<T> {
    serde_json::from_str(data)
}

impl<'de> Deserialize<'de> for ClientEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let Envelope { event, data } = Envelope::deserialize(deserializer)?;
        let data = data.as_deref().map_or("null", RawValue::get);

        let event = match event.as_str() {
            "join-room" => {
                let RoomData { room_id } = parse_data(data).map_err(D::Error::custom)?;
                Self::JoinRoom { room_id }
            }
            "leave-room" => {
                let RoomData { room_id } = parse_data(data).map_err(D::Error::custom)?;
                Self::LeaveRoom { room_id }
            }
            "signal-offer" => {
                let SdpData { room_id, to, sdp } = parse_data(data).map_err(D::Error::custom)?;
                Self::SignalOffer { room_id, to, sdp }
            }
            "signal-answer" => {
                let SdpData { room_id, to, sdp } = parse_data(data).map_err(D::Error::custom)?;
                Self::SignalAnswer { room_id, to, sdp }
            }
            "signal-ice" => {
                let IceData {
                    room_id,
                    to,
                    candidate,
                } = parse_data(data).map_err(D::Error::custom)?;
                Self::SignalIce {
                    room_id,
                    to,
                    candidate,
                }
            }
            "heartbeat" => {
                let HeartbeatData { client_time } =
                    parse_data(data).map_err(D::Error::custom)?;
                Self::Heartbeat { client_time }
            }
            other => return Err(de::Error::unknown_variant(other, CLIENT_EVENTS)),
        };
        Ok(event)
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Events the relay sends to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// First event on every connection: the id other peers will see.
    #[serde(rename_all = "camelCase")]
    Welcome { peer_id: PeerId },

    /// Reply to `join-room`: who was in the room before you arrived.
    #[serde(rename_all = "camelCase")]
    Members {
        room_id: RoomId,
        members: Vec<PeerId>,
    },

    /// Someone joined a room you are in.
    #[serde(rename_all = "camelCase")]
    PeerJoined { room_id: RoomId, peer_id: PeerId },

    /// Someone left a room you are in, or disconnected.
    #[serde(rename_all = "camelCase")]
    PeerLeft { room_id: RoomId, peer_id: PeerId },

    /// A relayed SDP offer.
    SignalOffer { from: PeerId, sdp: Blob },

    /// A relayed SDP answer.
    SignalAnswer { from: PeerId, sdp: Blob },

    /// A relayed network-path candidate.
    SignalIce { from: PeerId, candidate: Blob },

    /// Reply to `heartbeat`. `serverTime` is milliseconds since the relay
    /// started.
    #[serde(rename_all = "camelCase")]
    HeartbeatAck { client_time: u64, server_time: u64 },
}

impl ServerEvent {
    /// Builds the outbound form of a relayed signal, stamped with its sender.
    pub fn signal(kind: SignalKind, from: PeerId, payload: Blob) -> Self {
        match kind {
            SignalKind::Offer => Self::SignalOffer { from, sdp: payload },
            SignalKind::Answer => Self::SignalAnswer { from, sdp: payload },
            SignalKind::IceCandidate => Self::SignalIce {
                from,
                candidate: payload,
            },
        }
    }
}

/// A server event addressed to a single connection.
///
/// The registry and relay only produce these; handing them to the right
/// socket is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub to: PeerId,
    pub event: ServerEvent,
}

impl Outbound {
    pub fn new(to: PeerId, event: ServerEvent) -> Self {
        Self { to, event }
    }
}

// =========================================================================
// Tests
// =========================================================================

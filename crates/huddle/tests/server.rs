//! End-to-end tests: a real server on a random port, real WebSocket clients.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use huddle::prelude::*;
use serde_json::{Value, json};
use tokio::io::AsyncReadExt;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A connected client that has already consumed its `welcome`.
struct Client {
    ws: ClientWs,
    id: u64,
}

impl Client {
    async fn send(&mut self, frame: Value) {
        self.ws
            .send(Message::Text(frame.to_string().into()))
            .await
            .expect("send frame");
    }

    async fn recv(&mut self) -> Value {
        let msg = tokio::time::timeout(Duration::from_secs(2), self.ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("websocket error");
        serde_json::from_slice(&msg.into_data()).expect("event is JSON")
    }

    /// Asserts nothing arrives within a short window.
    async fn expect_silence(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(100), self.ws.next()).await;
        assert!(next.is_err(), "unexpected event: {next:?}");
    }

    async fn join(&mut self, room: &str) -> Value {
        self.send(json!({"event": "join-room", "data": {"roomId": room}}))
            .await;
        self.recv().await
    }
}

async fn start_server_from(builder: HuddleServerBuilder) -> (String, std::sync::Arc<Hub>) {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("local addr").to_string();
    let hub = server.hub();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    (addr, hub)
}

async fn start_server_with(idle: Duration) -> (String, std::sync::Arc<Hub>) {
    start_server_from(HuddleServer::builder().idle_timeout(idle)).await
}

async fn start_server() -> (String, std::sync::Arc<Hub>) {
    start_server_with(Duration::from_secs(30)).await
}

async fn connect(addr: &str) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    let mut client = Client { ws, id: 0 };
    let welcome = client.recv().await;
    assert_eq!(welcome["event"], "welcome");
    client.id = welcome["data"]["peerId"].as_u64().expect("numeric peer id");
    client
}

/// Polls until the hub agrees with `expected`, since detach runs on a
/// spawned task after the socket closes.
async fn wait_for_members(hub: &Hub, room: &str, expected: Vec<u64>) {
    let room = RoomId::from(room);
    let expected: Vec<PeerId> = expected.into_iter().map(PeerId).collect();
    for _ in 0..100 {
        if hub.members(&room).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("members of {room} never became {expected:?}");
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_welcome_assigns_distinct_ids() {
    let (addr, _hub) = start_server().await;
    let a = connect(&addr).await;
    let b = connect(&addr).await;
    assert_ne!(a.id, b.id);
}

#[tokio::test]
async fn test_two_peers_join_movie_night() {
    let (addr, _hub) = start_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;

    let members = a.join("movie-night").await;
    assert_eq!(
        members,
        json!({"event": "members", "data": {"roomId": "movie-night", "members": []}})
    );

    let members = b.join("movie-night").await;
    assert_eq!(members["data"]["members"], json!([a.id]));

    let joined = a.recv().await;
    assert_eq!(
        joined,
        json!({"event": "peer-joined", "data": {"roomId": "movie-night", "peerId": b.id}})
    );
}

#[tokio::test]
async fn test_disconnect_sends_single_peer_left() {
    let (addr, hub) = start_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    a.join("x").await;
    b.join("x").await;
    a.recv().await; // peer-joined

    let a_id = a.id;
    a.ws.close(None).await.expect("close");
    drop(a);

    let left = b.recv().await;
    assert_eq!(
        left,
        json!({"event": "peer-left", "data": {"roomId": "x", "peerId": a_id}})
    );
    b.expect_silence().await;
    wait_for_members(&hub, "x", vec![b.id]).await;
}

#[tokio::test]
async fn test_dropped_socket_is_cleaned_up() {
    let (addr, hub) = start_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    a.join("x").await;
    b.join("x").await;
    a.recv().await;

    // No close frame: the TCP stream just goes away.
    drop(a);

    let left = b.recv().await;
    assert_eq!(left["event"], "peer-left");
    wait_for_members(&hub, "x", vec![b.id]).await;
}

#[tokio::test]
async fn test_direct_offer_reaches_only_target() {
    let (addr, _hub) = start_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    let mut c = connect(&addr).await;
    a.join("one").await;
    b.join("two").await;

    let sdp = json!({"type": "offer", "sdp": "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\n"});
    a.send(json!({"event": "signal-offer", "data": {"to": b.id, "sdp": sdp}}))
        .await;

    assert_eq!(
        b.recv().await,
        json!({"event": "signal-offer", "data": {"from": a.id, "sdp": sdp}})
    );
    a.expect_silence().await;
    c.expect_silence().await;
}

#[tokio::test]
async fn test_room_candidate_reaches_every_other_member() {
    let (addr, _hub) = start_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    let mut c = connect(&addr).await;
    let mut outsider = connect(&addr).await;
    a.join("x").await;
    b.join("x").await;
    a.recv().await;
    c.join("x").await;
    a.recv().await;
    b.recv().await;
    outsider.join("y").await;

    let candidate = json!({
        "candidate": "candidate:0 1 UDP 1 10.0.0.1 9 typ host",
        "sdpMLineIndex": 0
    });
    b.send(json!({
        "event": "signal-ice",
        "data": {"roomId": "x", "candidate": candidate}
    }))
    .await;

    for peer in [&mut a, &mut c] {
        assert_eq!(
            peer.recv().await,
            json!({"event": "signal-ice", "data": {"from": b.id, "candidate": candidate}})
        );
    }
    b.expect_silence().await;
    outsider.expect_silence().await;
}

#[tokio::test]
async fn test_signal_without_destination_is_dropped_quietly() {
    let (addr, _hub) = start_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    a.join("x").await;
    b.join("x").await;
    a.recv().await;

    b.send(json!({"event": "signal-answer", "data": {"sdp": "answer"}}))
        .await;
    a.expect_silence().await;

    // The connection is still usable afterwards.
    b.send(json!({"event": "signal-answer", "data": {"to": a.id, "sdp": "answer"}}))
        .await;
    assert_eq!(a.recv().await["event"], "signal-answer");
}

#[tokio::test]
async fn test_garbage_frames_do_not_close_connection() {
    let (addr, _hub) = start_server().await;
    let mut a = connect(&addr).await;

    a.ws.send(Message::Text("{not json".into())).await.unwrap();
    a.send(json!({"event": "no-such-event", "data": {}})).await;
    a.send(json!({"event": "signal-offer", "data": {"to": 1}})).await;

    let members = a.join("still-here").await;
    assert_eq!(members["event"], "members");
}

#[tokio::test]
async fn test_last_leave_deletes_room() {
    let (addr, hub) = start_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    a.join("x").await;

    a.send(json!({"event": "leave-room", "data": {"roomId": "x"}}))
        .await;
    wait_for_members(&hub, "x", vec![]).await;
    assert_eq!(hub.room_count().await, 0);

    let members = b.join("x").await;
    assert_eq!(members["data"]["members"], json!([]));
}

#[tokio::test]
async fn test_leave_notifies_remaining_members() {
    let (addr, _hub) = start_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    a.join("x").await;
    b.join("x").await;
    a.recv().await;

    b.send(json!({"event": "leave-room", "data": {"roomId": "x"}}))
        .await;
    assert_eq!(
        a.recv().await,
        json!({"event": "peer-left", "data": {"roomId": "x", "peerId": b.id}})
    );
}

#[tokio::test]
async fn test_rejoin_does_not_repeat_peer_joined() {
    let (addr, _hub) = start_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    a.join("x").await;
    b.join("x").await;
    a.recv().await;

    let again = b.join("x").await;
    assert_eq!(again["data"]["members"], json!([a.id]));
    a.expect_silence().await;
}

#[tokio::test]
async fn test_heartbeat_is_acknowledged() {
    let (addr, _hub) = start_server().await;
    let mut a = connect(&addr).await;

    a.send(json!({"event": "heartbeat", "data": {"clientTime": 777}}))
        .await;
    let ack = a.recv().await;
    assert_eq!(ack["event"], "heartbeat-ack");
    assert_eq!(ack["data"]["clientTime"], 777);
    assert!(ack["data"]["serverTime"].is_u64());
}

#[tokio::test]
async fn test_idle_connection_is_dropped_and_peers_told() {
    let (addr, hub) = start_server_with(Duration::from_millis(300)).await;
    let mut quiet = connect(&addr).await;
    let mut chatty = connect(&addr).await;
    quiet.join("x").await;
    chatty.join("x").await;
    quiet.recv().await;

    // Keep `chatty` alive past the quiet peer's deadline; acks and the
    // peer-left may interleave.
    let mut left = None;
    for _ in 0..15 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        chatty
            .send(json!({"event": "heartbeat", "data": {"clientTime": 0}}))
            .await;
        let event = chatty.recv().await;
        if event["event"] == "peer-left" {
            left = Some(event);
            break;
        }
        assert_eq!(event["event"], "heartbeat-ack");
    }

    assert_eq!(
        left.expect("quiet peer should time out"),
        json!({"event": "peer-left", "data": {"roomId": "x", "peerId": quiet.id}})
    );
    wait_for_members(&hub, "x", vec![chatty.id]).await;
    assert!(hub.rooms_of(&PeerId(quiet.id)).await.is_empty());
}

#[tokio::test]
async fn test_stalled_handshake_does_not_block_other_clients() {
    let builder = HuddleServer::builder().handshake_timeout(Duration::from_millis(300));
    let (addr, hub) = start_server_from(builder).await;

    // Connects over TCP and never sends the upgrade request.
    let mut stalled = tokio::net::TcpStream::connect(&addr).await.unwrap();

    let mut a = tokio::time::timeout(Duration::from_secs(2), connect(&addr))
        .await
        .expect("accept loop must not wait on an unfinished handshake");
    a.join("x").await;
    assert_eq!(hub.peer_count().await, 1);

    // The stalled socket is closed once its handshake deadline passes.
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(2), stalled.read(&mut buf))
        .await
        .expect("stalled socket should be closed by the server");
    assert!(matches!(read, Ok(0) | Err(_)), "unexpected read: {read:?}");
    assert_eq!(hub.peer_count().await, 1);
}

#[tokio::test]
async fn test_payload_is_forwarded_byte_for_byte() {
    let (addr, _hub) = start_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;

    let sdp = r#"{"n":123456789012345678901234567890,"b":1,"a":2,"s":"\u00e9"}"#;
    let frame = format!(r#"{{"event":"signal-offer","data":{{"to":{},"sdp":{sdp}}}}}"#, b.id);
    a.ws.send(Message::Text(frame.into())).await.unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(2), b.ws.next())
        .await
        .expect("timed out waiting for offer")
        .expect("stream ended")
        .expect("websocket error");
    let text = msg.into_text().expect("text frame");
    assert_eq!(
        text.as_str(),
        format!(r#"{{"event":"signal-offer","data":{{"from":{},"sdp":{sdp}}}}}"#, a.id)
    );
}

//! Per-connection handler: attach, event loop, detach.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   0. Finish the WebSocket upgrade, bounded by the handshake timeout
//!   1. Attach to the hub → the client is queued a `welcome`
//!   2. Loop: decode inbound frames and dispatch them, flush the outbox,
//!      and watch the idle deadline
//!   3. Detach (via [`DetachGuard`]) on close, error, timeout, or panic

use std::sync::Arc;

use huddle_protocol::{ClientEvent, Codec, PeerId, ServerEvent};
use huddle_transport::{Connection, Handshake, WebSocketConnection, WebSocketHandshake};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::server::ServerState;
use crate::HuddleError;

/// Drop guard that detaches a peer when its handler exits.
///
/// This ensures room cleanup happens even if the handler panics. Since
/// `Drop` is synchronous, the async detach runs on a spawned task.
struct DetachGuard<C: Codec> {
    peer_id: PeerId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for DetachGuard<C> {
    fn drop(&mut self) {
        let peer_id = self.peer_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.hub.detach(peer_id).await;
        });
    }
}

/// Why the event loop stopped.
#[derive(Debug)]
enum Exit {
    Closed,
    IdleTimeout,
}

/// Handles a single connection from accepted socket to close.
pub(crate) async fn handle_connection<C: Codec>(
    handshake: WebSocketHandshake,
    state: Arc<ServerState<C>>,
) -> Result<(), HuddleError> {
    let remote = handshake.peer_addr();
    let conn = tokio::time::timeout(state.config.handshake_timeout, handshake.complete())
        .await
        .map_err(|_| HuddleError::HandshakeTimeout(remote))??;

    let peer_id = PeerId::from(conn.id());
    let (outbox_tx, mut outbox) = mpsc::unbounded_channel();

    state.hub.attach(peer_id, outbox_tx).await?;
    let _guard = DetachGuard {
        peer_id,
        state: Arc::clone(&state),
    };
    tracing::debug!(%peer_id, remote = %conn.remote_addr(), "connection attached");

    let exit = event_loop(&conn, &state, peer_id, &mut outbox).await?;
    tracing::info!(%peer_id, ?exit, "connection finished");

    if matches!(exit, Exit::IdleTimeout) {
        if let Err(e) = conn.close().await {
            tracing::debug!(%peer_id, error = %e, "close after idle timeout failed");
        }
    }

    // _guard drops here → hub.detach fires.
    Ok(())
}

async fn event_loop<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    peer_id: PeerId,
    outbox: &mut mpsc::UnboundedReceiver<ServerEvent>,
) -> Result<Exit, HuddleError> {
    let idle = state.config.idle_timeout;
    let mut deadline = Instant::now() + idle;

    loop {
        tokio::select! {
            inbound = conn.recv() => {
                let data = match inbound {
                    Ok(Some(data)) => data,
                    Ok(None) => return Ok(Exit::Closed),
                    Err(e) => {
                        tracing::debug!(%peer_id, error = %e, "recv error");
                        return Ok(Exit::Closed);
                    }
                };
                deadline = Instant::now() + idle;

                let event: ClientEvent = match state.codec.decode(&data) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::debug!(%peer_id, error = %e, "failed to decode event");
                        continue;
                    }
                };
                state.hub.dispatch(peer_id, event).await;
            }

            Some(event) = outbox.recv() => {
                let bytes = state.codec.encode(&event)?;
                conn.send(&bytes).await?;
            }

            () = tokio::time::sleep_until(deadline) => {
                return Ok(Exit::IdleTimeout);
            }
        }
    }
}

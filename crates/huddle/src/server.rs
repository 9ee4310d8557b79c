//! `HuddleServer` builder and accept loop.
//!
//! This ties the layers together: transport → protocol → hub (sessions and
//! rooms).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use huddle_protocol::{Codec, JsonCodec};
use huddle_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{HuddleError, Hub, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) hub: Arc<Hub>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Huddle server.
///
/// # Example
///
/// ```rust,no_run
/// use huddle::HuddleServer;
///
/// # async fn run() -> Result<(), huddle::HuddleError> {
/// let server = HuddleServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct HuddleServerBuilder {
    config: ServerConfig,
}

impl HuddleServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration, e.g. with one read from the
    /// environment.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a new socket may take to finish its WebSocket upgrade.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Sets how long a silent connection is kept before it is dropped.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Binds the listener. Uses `JsonCodec` over `WebSocketTransport`.
    pub async fn build(self) -> Result<HuddleServer<JsonCodec>, HuddleError> {
        self.build_with_codec(JsonCodec).await
    }

    /// Binds the listener with a custom frame codec.
    pub async fn build_with_codec<C: Codec>(
        self,
        codec: C,
    ) -> Result<HuddleServer<C>, HuddleError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let state = Arc::new(ServerState {
            hub: Arc::new(Hub::new()),
            codec,
            config: self.config,
        });
        Ok(HuddleServer { transport, state })
    }
}

/// A bound Huddle signaling server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct HuddleServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl HuddleServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> HuddleServerBuilder {
        HuddleServerBuilder::new()
    }
}

impl<C: Codec> HuddleServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, HuddleError> {
        Ok(self.transport.local_addr()?)
    }

    /// Returns a handle to the shared hub, for inspection or for feeding it
    /// events from another transport.
    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(&self.state.hub)
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task per accepted socket; the WebSocket upgrade
    /// runs in that task, so a client that never finishes it cannot hold
    /// up anyone else. Runs until the future is dropped. A failed accept is
    /// logged and skipped.
    pub async fn run(mut self) -> Result<(), HuddleError> {
        tracing::info!(
            addr = %self.config().bind_addr,
            idle_timeout = ?self.config().idle_timeout,
            handshake_timeout = ?self.config().handshake_timeout,
            "Huddle signaling relay running"
        );

        loop {
            match self.transport.accept().await {
                Ok(handshake) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(handshake, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }

    fn config(&self) -> &ServerConfig {
        &self.state.config
    }
}

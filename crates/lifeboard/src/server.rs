//! `LifeboardServer` builder and server loop.
//!
//! This is the entry point for running a Lifeboard server. It ties the
//! layers together: transport → protocol → room.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lifeboard_protocol::{Codec, JsonCodec};
use lifeboard_room::{RoomConfig, RoomRegistry};
use lifeboard_transport::{Transport, TransportError, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{LifeboardError, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) rooms: Arc<RoomRegistry>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Lifeboard server.
///
/// # Example
///
/// ```rust,no_run
/// use lifeboard::prelude::*;
///
/// # async fn start() -> Result<(), LifeboardError> {
/// let server = LifeboardServer::builder()
///     .bind("0.0.0.0:8001")
///     .static_dir("./static")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct LifeboardServerBuilder {
    config: ServerConfig,
    registry: Option<Arc<RoomRegistry>>,
}

impl LifeboardServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            registry: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Serves plain HTTP requests from `dir`.
    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.static_dir = Some(dir.into());
        self
    }

    /// Sets the settings every new room is created with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.room = config;
        self
    }

    /// Closes a connection after `limit` malformed envelopes in a row.
    pub fn malformed_limit(mut self, limit: u32) -> Self {
        self.config.malformed_limit = Some(limit);
        self
    }

    /// Evicts rooms without clients every `period`.
    pub fn idle_sweep(mut self, period: Duration) -> Self {
        self.config.idle_sweep = Some(period);
        self
    }

    /// Uses an existing registry instead of creating one.
    ///
    /// The registry keeps its own [`RoomConfig`]; anything set through
    /// [`room_config`](Self::room_config) is ignored.
    pub fn registry(mut self, registry: Arc<RoomRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Binds the listener and builds the server with [`JsonCodec`].
    pub async fn build(self) -> Result<LifeboardServer<JsonCodec>, LifeboardError> {
        self.build_with_codec(JsonCodec).await
    }

    /// Binds the listener and builds the server with a custom codec.
    pub async fn build_with_codec<C: Codec>(
        self,
        codec: C,
    ) -> Result<LifeboardServer<C>, LifeboardError> {
        let mut transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        if let Some(dir) = &self.config.static_dir {
            tracing::info!(dir = %dir.display(), "serving static files");
            transport = transport.with_static_root(dir.clone());
        }

        let rooms = self
            .registry
            .unwrap_or_else(|| Arc::new(RoomRegistry::new(self.config.room.clone())));

        let state = Arc::new(ServerState {
            rooms,
            codec,
            config: self.config,
        });

        Ok(LifeboardServer { transport, state })
    }
}

impl Default for LifeboardServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Lifeboard server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct LifeboardServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl LifeboardServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> LifeboardServerBuilder {
        LifeboardServerBuilder::new()
    }
}

impl<C: Codec> LifeboardServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry holding this server's rooms.
    pub fn rooms(&self) -> Arc<RoomRegistry> {
        Arc::clone(&self.state.rooms)
    }

    /// Runs the server accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), LifeboardError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the server accept loop until `signal` resolves.
    ///
    /// Spawns a session task per accepted connection and, when
    /// configured, the idle-room sweep. On the signal the transport stops
    /// taking connections; sessions already running carry on until their
    /// peers leave.
    pub async fn run_until(
        mut self,
        signal: impl Future<Output = ()>,
    ) -> Result<(), LifeboardError> {
        tracing::info!("Lifeboard server running");

        let sweep = self
            .state
            .config
            .idle_sweep
            .filter(|p| !p.is_zero())
            .map(|period| {
                tokio::spawn(sweep_idle_rooms(Arc::clone(&self.state.rooms), period))
            });

        let mut signal = std::pin::pin!(signal);
        let result: Result<(), LifeboardError> = loop {
            let accepted = tokio::select! {
                accepted = self.transport.accept() => Some(accepted),
                () = &mut signal => None,
            };

            match accepted {
                Some(Ok(conn)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Some(Err(TransportError::Shutdown)) => {
                    tracing::info!("transport closed, server stopping");
                    break Ok(());
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "accept failed");
                }
                None => {
                    tracing::info!("shutdown requested");
                    break self.transport.shutdown().await.map_err(Into::into);
                }
            }
        };

        if let Some(sweep) = sweep {
            sweep.abort();
        }
        result
    }
}

async fn sweep_idle_rooms(rooms: Arc<RoomRegistry>, period: Duration) {
    let start = tokio::time::Instant::now() + period;
    let mut interval = tokio::time::interval_at(start, period);
    loop {
        interval.tick().await;
        let evicted = rooms.evict_idle();
        tracing::trace!(evicted, remaining = rooms.len(), "idle sweep");
    }
}

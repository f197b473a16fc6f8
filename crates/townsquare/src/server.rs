//! `TownsquareServer` builder and server loop.
//!
//! This is the entry point for running a Townsquare server. It ties
//! together all the layers: transport → protocol → towns → provider.

use std::sync::Arc;
use std::time::Duration;

use townsquare_protocol::{Codec, JsonCodec};
use townsquare_provider::ChannelProvider;
use townsquare_town::TownStore;
use townsquare_transport::{Transport, WebSocketTransport};

use crate::connection::handle_connection;
use crate::{ServerConfig, TownService, TownsquareError};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
pub(crate) struct ServerState<P: ChannelProvider, K: Codec> {
    pub(crate) service: TownService<P>,
    pub(crate) config: ServerConfig,
    pub(crate) codec: K,
}

/// Builder for configuring and starting a Townsquare server.
///
/// # Example
///
/// ```rust,no_run
/// use townsquare::prelude::*;
///
/// # async fn start() -> Result<(), TownsquareError> {
/// let server = TownsquareServerBuilder::new()
///     .bind("0.0.0.0:8081")
///     .echo_own_movement(false)
///     .build(InMemoryProvider::new())
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TownsquareServerBuilder {
    config: ServerConfig,
}

impl TownsquareServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
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

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Whether a mover's own live connection sees its movement.
    pub fn echo_own_movement(mut self, echo: bool) -> Self {
        self.config.echo_own_movement = echo;
        self
    }

    pub fn town_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.town_channel_capacity = capacity;
        self
    }

    /// Binds the listener and assembles the server around `provider`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<P: ChannelProvider>(
        self,
        provider: P,
    ) -> Result<TownsquareServer<P, JsonCodec>, TownsquareError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr)
            .await?
            .with_handshake_timeout(self.config.handshake_timeout);

        let store = TownStore::with_channel_size(self.config.town_channel_capacity);
        let state = Arc::new(ServerState {
            service: TownService::with_store(store, provider),
            config: self.config,
            codec: JsonCodec,
        });

        Ok(TownsquareServer { transport, state })
    }
}

/// A bound Townsquare server.
///
/// Built with [`TownsquareServerBuilder`]. Call [`run()`](Self::run) to
/// start accepting connections.
pub struct TownsquareServer<P: ChannelProvider, K: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<P, K>>,
}

impl<P, K> TownsquareServer<P, K>
where
    P: ChannelProvider,
    K: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, TownsquareError> {
        Ok(self.transport.local_addr()?)
    }

    /// The configuration the server runs with.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Runs the server accept loop.
    ///
    /// Spawns a handler task for each accepted connection. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), TownsquareError> {
        tracing::info!(
            addr = %self.state.config.bind_addr,
            "Townsquare server running"
        );

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
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
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }
}

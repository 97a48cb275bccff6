//! `PlazaServer` builder and accept loop.
//!
//! This is the socket side of Plaza. It ties together the layers:
//! transport → protocol → town. The request/response side lives in
//! [`TownService`](crate::TownService); both share one [`TownRegistry`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use plaza_protocol::{Codec, JsonCodec};
use plaza_town::TownRegistry;
use plaza_transport::{Transport, WebSocketTransport};

use crate::PlazaError;
use crate::handler::handle_connection;

/// How long a new socket has to send its `Subscribe` frame.
pub const DEFAULT_SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a subscribed socket may go without sending any frame, pongs
/// to our keepalive pings included, before it is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Arc<TownRegistry>,
    pub(crate) codec: C,
    pub(crate) subscribe_timeout: Duration,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a Plaza socket server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use plaza::prelude::*;
///
/// # async fn run() -> Result<(), PlazaError> {
/// let registry = Arc::new(TownRegistry::default());
/// let server = PlazaServer::builder()
///     .bind("0.0.0.0:8080")
///     .registry(Arc::clone(&registry))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PlazaServerBuilder {
    bind_addr: String,
    registry: Option<Arc<TownRegistry>>,
    subscribe_timeout: Duration,
    idle_timeout: Duration,
}

impl PlazaServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            registry: None,
            subscribe_timeout: DEFAULT_SUBSCRIBE_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Uses `registry` for town lookups. Without one the server gets a
    /// private, empty registry.
    pub fn registry(mut self, registry: Arc<TownRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn subscribe_timeout(mut self, timeout: Duration) -> Self {
        self.subscribe_timeout = timeout;
        self
    }

    /// Silence allowed before a socket counts as dead. The server pings
    /// every third of this, so a connected client that merely stands
    /// still is never dropped.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Binds the listener. Uses `JsonCodec` over `WebSocketTransport`.
    pub async fn build(self) -> Result<PlazaServer<JsonCodec>, PlazaError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: self.registry.unwrap_or_default(),
            codec: JsonCodec,
            subscribe_timeout: self.subscribe_timeout,
            idle_timeout: self.idle_timeout,
        });

        Ok(PlazaServer { transport, state })
    }
}

impl Default for PlazaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Plaza socket server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PlazaServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl PlazaServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> PlazaServerBuilder {
        PlazaServerBuilder::new()
    }
}

impl<C> PlazaServer<C>
where
    C: Codec + Send + Sync + 'static,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, PlazaError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop, one handler task per connection, until the
    /// process ends. A failing connection only ends its own task.
    pub async fn run(mut self) -> Result<(), PlazaError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "plaza server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

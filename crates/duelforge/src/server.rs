//! `DuelforgeServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session.

use std::net::SocketAddr;
use std::sync::Arc;

use duelforge_protocol::{Codec, JsonCodec};
use duelforge_session::{Coordinator, RulesEngine, SessionConfig, SessionRegistry};
use duelforge_transport::{Transport, WebSocketTransport};

use crate::DuelforgeError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection task.
pub(crate) struct ServerState<R: RulesEngine, C: Codec> {
    pub(crate) coordinator: Coordinator<R>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Duelforge server.
///
/// # Example
///
/// ```rust,ignore
/// use duelforge::prelude::*;
///
/// let server = DuelforgeServer::builder()
///     .bind("0.0.0.0:3001")
///     .build(TicTacToe)
///     .await?;
/// server.run().await
/// ```
pub struct DuelforgeServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
}

impl DuelforgeServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session actor configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Binds the listener and returns a server playing `engine`'s rules.
    ///
    /// Uses `JsonCodec` over `WebSocketTransport`.
    pub async fn build<R: RulesEngine>(
        self,
        engine: R,
    ) -> Result<DuelforgeServer<R, JsonCodec>, DuelforgeError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let registry = SessionRegistry::new(engine, self.session_config);

        let state = Arc::new(ServerState {
            coordinator: Coordinator::new(registry),
            codec: JsonCodec,
        });

        Ok(DuelforgeServer { transport, state })
    }
}

impl Default for DuelforgeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Duelforge server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct DuelforgeServer<R: RulesEngine, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<R, C>>,
}

impl<R, C> DuelforgeServer<R, C>
where
    R: RulesEngine,
    C: Codec,
{
    /// Creates a new builder.
    pub fn builder() -> DuelforgeServerBuilder {
        DuelforgeServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The coordinator every connection reports to.
    pub fn coordinator(&self) -> &Coordinator<R> {
        &self.state.coordinator
    }

    /// Runs the accept loop, spawning one task per connection. Runs
    /// until the process is terminated.
    pub async fn run(mut self) -> Result<(), DuelforgeError> {
        let addr = self.local_addr().ok();
        tracing::info!(?addr, "duelforge server running");

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

//! The BoardSync server: builder, accept loop and shutdown.
//!
//! The hub is spawned before the listener binds, so every accepted
//! connection and every notifier handed out has a live hub behind it.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use boardsync_hub::{ChangeNotifier, HubConfig, HubHandle, spawn_hub};
use boardsync_session::Authenticator;
use boardsync_transport::{
    IncomingConnection, Transport, WebSocketConnection, WebSocketTransport,
};

use crate::handler::handle_session;
use crate::{BoardSyncError, ServerConfig};

/// Shared state for all connection tasks.
pub(crate) struct ServerState<A: Authenticator> {
    pub(crate) auth: A,
    pub(crate) hub: HubHandle<WebSocketConnection>,
}

/// Builder for configuring and creating a [`BoardSyncServer`].
///
/// # Example
///
/// ```rust,ignore
/// let server = BoardSyncServer::builder()
///     .bind("0.0.0.0:3000")
///     .build(JwtAuthenticator::new(secret))
///     .await?;
/// let board = TaskBoard::new(server.notifier());
/// server.run().await?;
/// ```
pub struct BoardSyncServerBuilder {
    bind_addr: String,
    hub_config: HubConfig,
}

impl BoardSyncServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            hub_config: HubConfig::default(),
        }
    }

    /// Starts from a loaded [`ServerConfig`].
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            bind_addr: config.bind_addr(),
            hub_config: config.hub.clone(),
        }
    }

    /// Sets the address to listen on (default `127.0.0.1:3000`).
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn hub_config(mut self, config: HubConfig) -> Self {
        self.hub_config = config;
        self
    }

    /// Spawns the hub, then binds the listener.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<BoardSyncServer<A>, BoardSyncError> {
        let hub = spawn_hub(self.hub_config);
        let transport = match WebSocketTransport::bind(&self.bind_addr).await {
            Ok(transport) => transport,
            Err(e) => {
                let _ = hub.shutdown().await;
                return Err(e.into());
            }
        };

        Ok(BoardSyncServer {
            transport,
            state: Arc::new(ServerState { auth, hub }),
        })
    }
}

impl Default for BoardSyncServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running BoardSync server.
pub struct BoardSyncServer<A: Authenticator> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A>>,
}

impl<A: Authenticator> BoardSyncServer<A> {
    pub fn builder() -> BoardSyncServerBuilder {
        BoardSyncServerBuilder::new()
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Handle to the server's hub.
    pub fn hub(&self) -> HubHandle<WebSocketConnection> {
        self.state.hub.clone()
    }

    /// A notifier wired to this server's hub, for the CRUD layer.
    pub fn notifier(&self) -> ChangeNotifier<WebSocketConnection> {
        ChangeNotifier::new(self.hub())
    }

    /// Accepts connections until the process exits.
    pub async fn run(self) -> Result<(), BoardSyncError> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves, then closes every
    /// session and stops the hub.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), BoardSyncError> {
        tracing::info!("BoardSync server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(incoming) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(admit(incoming, state));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => break,
            }
        }

        tracing::info!("BoardSync server shutting down");
        self.state.hub.shutdown().await?;
        Ok(())
    }
}

/// Completes the upgrade for one accepted connection and runs its session.
async fn admit<A: Authenticator>(
    incoming: IncomingConnection,
    state: Arc<ServerState<A>>,
) {
    let peer = incoming.peer_addr();
    let mut conn = match WebSocketTransport::handshake(incoming).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::debug!(%peer, error = %e, "handshake failed");
            return;
        }
    };
    let token = conn.take_token();
    if let Err(e) = handle_session(conn, token, &state.auth, &state.hub).await {
        tracing::debug!(%peer, error = %e, "connection ended with error");
    }
}

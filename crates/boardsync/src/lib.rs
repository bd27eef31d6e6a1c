//! BoardSync: real-time task change notifications.
//!
//! Clients open a WebSocket to `/ws?token=<jwt>`. Once admitted, every
//! committed create/update/delete on one of their tasks is pushed to all of
//! their open sessions as a JSON text frame.
//!
//! ```rust,ignore
//! use boardsync::prelude::*;
//!
//! let config = ServerConfig::from_env()?;
//! let server = BoardSyncServerBuilder::from_config(&config)
//!     .build(JwtAuthenticator::new(config.jwt_secret.as_bytes()))
//!     .await?;
//! let board = TaskBoard::new(server.notifier());
//! server.run().await?;
//! ```

mod board;
mod config;
mod error;
mod handler;
mod server;

pub use board::{TaskBoard, TaskDraft};
pub use config::ServerConfig;
pub use error::{BoardSyncError, StoreError};
pub use handler::handle_session;
pub use server::{BoardSyncServer, BoardSyncServerBuilder};

/// The types most applications need.
pub mod prelude {
    pub use crate::{
        BoardSyncError, BoardSyncServer, BoardSyncServerBuilder, ServerConfig,
        StoreError, TaskBoard, TaskDraft,
    };
    pub use boardsync_hub::{ChangeNotifier, HubConfig, HubHandle};
    pub use boardsync_protocol::{
        ChangeEvent, ChangeKind, Notification, OwnerId, Task, TaskId,
    };
    pub use boardsync_session::{
        AuthError, Authenticator, Claims, JwtAuthenticator, TokenIssuer,
    };
    pub use boardsync_transport::{Connection, WebSocketConnection};
}

//! Connection registry and change-event fan-out for BoardSync.
//!
//! The hub is a single actor task that owns every live [`Session`] grouped
//! by owner. All membership changes and dispatches go through its command
//! queue, so they are applied in submission order:
//!
//! ```text
//! lifecycle task ──register/unregister──┐
//!                                       ├──→ HubActor ──send──→ sessions of owner
//! ChangeNotifier ──────dispatch─────────┘
//! ```
//!
//! [`HubHandle`] is the cloneable front door; [`ChangeNotifier`] is what
//! the CRUD layer holds to report committed writes.
//!
//! [`Session`]: boardsync_session::Session

mod config;
mod error;
mod hub;
mod notifier;

pub use config::{HubConfig, HubStats};
pub use error::HubError;
pub use hub::{HubHandle, spawn_hub};
pub use notifier::ChangeNotifier;

//! Session admission and live session handles for BoardSync.
//!
//! - [`Authenticator`] / [`JwtAuthenticator`] turn the bearer credential
//!   presented on the upgrade request into an [`OwnerId`](boardsync_protocol::OwnerId).
//! - [`TokenIssuer`] signs credentials for the sign-in flow.
//! - [`Session`] is an admitted connection bound to its owner; the hub
//!   holds it and is the only component that writes to it.

mod auth;
mod error;
mod session;

pub use auth::{Authenticator, Claims, JwtAuthenticator, TokenIssuer};
pub use error::AuthError;
pub use session::Session;

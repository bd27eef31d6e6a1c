//! Wire protocol for BoardSync.
//!
//! This crate defines what the real-time core talks about:
//!
//! - **Identities** ([`OwnerId`], [`TaskId`]): 12-byte object ids that
//!   travel as 24 lowercase hex characters.
//! - **Domain values** ([`Task`], [`ChangeKind`], [`ChangeEvent`]): what
//!   the CRUD layer hands to the dispatcher after a committed write.
//! - **Wire format** ([`Notification`]): the JSON text frame pushed to
//!   every live session of the task's owner.
//!
//! The protocol layer knows nothing about connections or the hub.
//!
//! ```text
//! CRUD write → ChangeEvent → Notification (JSON) → every session of owner
//! ```

mod error;
mod types;

pub use error::ProtocolError;
pub use types::{ChangeEvent, ChangeKind, Notification, OwnerId, Task, TaskId};

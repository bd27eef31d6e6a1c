//! Core protocol types: identities, task snapshots and change events.
//!
//! Every type here either travels on the wire inside a [`Notification`] or
//! is the routing key the hub uses to find an owner's sessions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ProtocolError;

/// Length in bytes of an object id.
const OBJECT_ID_LEN: usize = 12;

/// Defines a 12-byte object id newtype that serializes as 24 hex chars.
macro_rules! object_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; OBJECT_ID_LEN]);

        impl $name {
            /// Wraps raw id bytes.
            pub const fn from_bytes(bytes: [u8; OBJECT_ID_LEN]) -> Self {
                Self(bytes)
            }

            /// Generates a fresh random id.
            pub fn generate() -> Self {
                Self(rand::random())
            }

            /// Returns the raw id bytes.
            pub fn as_bytes(&self) -> &[u8; OBJECT_ID_LEN] {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = ProtocolError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_hex(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

object_id! {
    /// Identity of a task owner: the primary key of the user record.
    ///
    /// Used purely as a routing key; the hub groups sessions by it.
    OwnerId
}

object_id! {
    /// Identity of a task.
    TaskId
}

fn decode_hex(s: &str) -> Result<[u8; OBJECT_ID_LEN], ProtocolError> {
    if s.len() != OBJECT_ID_LEN * 2
        || !s.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return Err(ProtocolError::InvalidId(s.to_owned()));
    }
    let mut bytes = [0u8; OBJECT_ID_LEN];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
            .map_err(|_| ProtocolError::InvalidId(s.to_owned()))?;
    }
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Task snapshot
// ---------------------------------------------------------------------------

/// Full snapshot of a task as sent in create/update notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub status: String,
    #[serde(rename = "userId")]
    pub user_id: OwnerId,
}

// ---------------------------------------------------------------------------
// Change events
// ---------------------------------------------------------------------------

/// What happened to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    /// The wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed change to one task, routed to the task owner's sessions.
///
/// Create and update events always carry the full snapshot; delete events
/// never do. The constructors enforce this, so a `ChangeEvent` in hand is
/// always well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    kind: ChangeKind,
    task_id: TaskId,
    owner: OwnerId,
    snapshot: Option<Task>,
}

impl ChangeEvent {
    /// A task was created.
    pub fn created(task: Task) -> Self {
        Self {
            kind: ChangeKind::Create,
            task_id: task.id,
            owner: task.user_id,
            snapshot: Some(task),
        }
    }

    /// A task was updated; `task` is the state after the write.
    pub fn updated(task: Task) -> Self {
        Self {
            kind: ChangeKind::Update,
            task_id: task.id,
            owner: task.user_id,
            snapshot: Some(task),
        }
    }

    /// A task was deleted.
    pub fn deleted(task_id: TaskId, owner: OwnerId) -> Self {
        Self {
            kind: ChangeKind::Delete,
            task_id,
            owner,
            snapshot: None,
        }
    }

    /// Builds an event from loose parts.
    ///
    /// A snapshot passed with a delete is discarded. A missing snapshot for
    /// create/update, or one whose id or owner disagrees with `task_id` /
    /// `owner`, is rejected.
    pub fn new(
        kind: ChangeKind,
        task_id: TaskId,
        owner: OwnerId,
        snapshot: Option<Task>,
    ) -> Result<Self, ProtocolError> {
        if kind == ChangeKind::Delete {
            return Ok(Self::deleted(task_id, owner));
        }
        let task = snapshot.ok_or_else(|| {
            ProtocolError::InvalidMessage(format!(
                "{kind} event for task {task_id} has no snapshot"
            ))
        })?;
        if task.id != task_id || task.user_id != owner {
            return Err(ProtocolError::InvalidMessage(format!(
                "snapshot {}/{} does not match {kind} event {task_id}/{owner}",
                task.id, task.user_id
            )));
        }
        Ok(Self {
            kind,
            task_id,
            owner,
            snapshot: Some(task),
        })
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// The routing key: whose sessions receive this event.
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn snapshot(&self) -> Option<&Task> {
        self.snapshot.as_ref()
    }

    /// Converts the event into its wire form.
    pub fn to_notification(&self) -> Notification {
        Notification {
            kind: self.kind,
            task_id: self.task_id,
            user_id: self.owner,
            data: self.snapshot.clone(),
        }
    }

    /// Serializes the event into the JSON text frame sent to clients.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        self.to_notification().to_json()
    }
}

// ---------------------------------------------------------------------------
// Wire message
// ---------------------------------------------------------------------------

/// The JSON text frame pushed to clients.
///
/// ```json
/// {"type":"update","taskId":"…","userId":"…","data":{"id":"…", …}}
/// ```
///
/// `data` is omitted entirely for deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(rename = "taskId")]
    pub task_id: TaskId,
    #[serde(rename = "userId")]
    pub user_id: OwnerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Task>,
}

impl Notification {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}

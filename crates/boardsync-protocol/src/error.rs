//! Error types for the protocol layer.

/// Errors that can occur while building or encoding protocol values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a notification into JSON text).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (turning JSON text into a notification).
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// A string could not be parsed as a 24-character hex object id.
    #[error("invalid object id: {0:?}")]
    InvalidId(String),

    /// The value is well-formed but breaks a protocol rule, such as a
    /// create event without a task snapshot.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

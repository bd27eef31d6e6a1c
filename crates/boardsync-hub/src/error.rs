use boardsync_protocol::OwnerId;

/// Errors returned by [`HubHandle`](crate::HubHandle) operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The hub actor has stopped (shut down or never started).
    #[error("hub is unavailable")]
    Unavailable,

    /// The owner already has the maximum number of live sessions.
    #[error("owner {0} already has {1} live sessions")]
    OwnerAtCapacity(OwnerId, usize),
}

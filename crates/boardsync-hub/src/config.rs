use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning knobs for the hub actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Upper bound on a single push to a single session. A push that takes
    /// longer counts as a transport failure and the session is dropped.
    pub send_timeout: Duration,

    /// Capacity of the actor's command queue. Callers wait for room when
    /// it is full.
    pub command_buffer: usize,

    /// Maximum live sessions per owner. Further registrations for that
    /// owner are refused.
    pub max_sessions_per_owner: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
            command_buffer: 256,
            max_sessions_per_owner: 64,
        }
    }
}

/// Point-in-time registry size, as seen by the actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubStats {
    /// Owners with at least one live session.
    pub owners: usize,
    /// Live sessions across all owners.
    pub sessions: usize,
}

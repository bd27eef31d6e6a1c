//! Process configuration, read once at startup.

use std::time::Duration;

use boardsync_hub::HubConfig;

use crate::BoardSyncError;

/// Server configuration.
///
/// | Variable | Default |
/// |---|---|
/// | `HOST` | `0.0.0.0` |
/// | `PORT` | `3000` |
/// | `JWT_SECRET` | required |
/// | `SEND_TIMEOUT_MS` | `5000` |
/// | `MAX_SESSIONS_PER_OWNER` | `64` |
///
/// Empty values count as unset.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub hub: HubConfig,
}

impl ServerConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, BoardSyncError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration from an arbitrary key/value source.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, BoardSyncError> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or_else(|| {
            BoardSyncError::Config("JWT_SECRET must be set".into())
        })?;

        let mut hub = HubConfig::default();
        if let Some(ms) = parse::<u64>(get("SEND_TIMEOUT_MS"), "SEND_TIMEOUT_MS")? {
            hub.send_timeout = Duration::from_millis(ms);
        }
        if let Some(max) =
            parse::<usize>(get("MAX_SESSIONS_PER_OWNER"), "MAX_SESSIONS_PER_OWNER")?
        {
            hub.max_sessions_per_owner = max;
        }

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse(get("PORT"), "PORT")?.unwrap_or(3000),
            jwt_secret,
            hub,
        })
    }

    /// `host:port`, ready for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
) -> Result<Option<T>, BoardSyncError> {
    value
        .map(|v| {
            v.parse().map_err(|_| {
                BoardSyncError::Config(format!("{key} has invalid value {v:?}"))
            })
        })
        .transpose()
}

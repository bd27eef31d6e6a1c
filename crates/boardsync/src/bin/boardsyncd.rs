//! `boardsyncd`: standalone BoardSync notification server.
//!
//! Configured from the environment (see [`ServerConfig`]); log level via
//! `RUST_LOG`. Runs until Ctrl-C, then closes every session.

use boardsync::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), BoardSyncError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.bind_addr(),
        "boardsyncd starting"
    );

    let server = BoardSyncServerBuilder::from_config(&config)
        .build(JwtAuthenticator::new(config.jwt_secret.as_bytes()))
        .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown signal received");
        })
        .await
}

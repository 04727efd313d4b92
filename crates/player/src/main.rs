//! signage-player entry point.
//!
//! Boots the rotation headless: loads configuration, wires the HTTP
//! collaborators and the image cache, and runs until Ctrl-C.
//! Logging goes to stderr as JSON.

use anyhow::Result;
use signage_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod app;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!("Starting signage-player");

    let player = app::Player::build(&config).await?;
    player
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await?;

    Ok(())
}

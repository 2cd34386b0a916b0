//! Clean command.

use anyhow::Result;
use quire_build::{BuildDriver, Settings};

/// Remove rendered outputs, cached resources and materialized defaults.
pub async fn run(settings: Settings) -> Result<()> {
    let removed =
        tokio::task::spawn_blocking(move || BuildDriver::from_settings(settings).clean()).await??;

    for path in &removed {
        tracing::info!("Removed {}", path.display());
    }
    tracing::info!("Removed {} file(s)", removed.len());

    Ok(())
}

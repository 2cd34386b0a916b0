//! Update command.

use anyhow::Result;
use quire_build::{BuildDriver, Settings};

/// Fetch the citation database and normative snapshot again.
///
/// Each resource is refreshed even if the other fails; a failed refresh
/// keeps the previous copy.
pub async fn run(settings: Settings) -> Result<()> {
    let results =
        tokio::task::spawn_blocking(move || BuildDriver::from_settings(settings).update()).await?;

    let mut failed = 0;
    for (resource, result) in results {
        match result {
            Ok(path) => tracing::info!("Updated {} ({})", resource, path.display()),
            Err(e) => {
                tracing::error!("{}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} resource(s) could not be updated", failed);
    }

    Ok(())
}

//! Watch command.

use std::path::PathBuf;

use anyhow::Result;
use quire_build::Settings;
use quire_watch::FileWatcher;

use super::build;

/// Build once, then rebuild stale targets whenever a source document or
/// configuration layer changes. Runs until interrupted.
pub async fn run(settings: Settings) -> Result<()> {
    if let Err(e) = build::build(settings.clone(), Vec::new()).await {
        tracing::error!("{}", e);
    }

    let (_watcher, mut rx) = FileWatcher::new(&settings.source_dir, &watched_layers(&settings))?;
    tracing::info!(
        "Watching {} for changes (Ctrl+C to stop)",
        settings.source_dir.display()
    );

    loop {
        let event = tokio::select! {
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping");
                break;
            }
        };

        if !event.is_relevant() {
            continue;
        }
        tracing::info!("Changed: {}", event.path().display());

        // Fold everything already queued into this rebuild.
        while let Ok(extra) = rx.try_recv() {
            tracing::debug!("Changed: {}", extra.path().display());
        }

        // A fresh driver per run, so resources that failed to fetch are
        // retried.
        if let Err(e) = build::build(settings.clone(), Vec::new()).await {
            tracing::error!("{}", e);
        }
    }

    Ok(())
}

fn watched_layers(settings: &Settings) -> Vec<PathBuf> {
    let mut layers = vec![settings.repo_defaults_path(), settings.repo_metadata_path()];
    if let Some(engine) = &settings.engine_defaults {
        layers.push(engine.clone());
    }
    layers
}

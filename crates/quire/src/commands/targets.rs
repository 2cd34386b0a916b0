//! Targets command.

use std::fs;

use anyhow::Result;
use quire_build::{BuildDriver, Freshness, Settings, TargetStatus};

/// List every target with its kind, output and freshness.
pub async fn run(settings: Settings) -> Result<()> {
    let statuses =
        tokio::task::spawn_blocking(move || BuildDriver::from_settings(settings).plan(&[])).await??;

    if statuses.is_empty() {
        tracing::warn!("No targets found");
        return Ok(());
    }

    for status in &statuses {
        println!("{}", row(status, title(status).as_deref()));
    }

    Ok(())
}

fn title(status: &TargetStatus) -> Option<String> {
    let source = fs::read_to_string(&status.target.source).ok()?;
    quire_doc::parse_document(&source).ok()?.title().map(str::to_string)
}

fn row(status: &TargetStatus, title: Option<&str>) -> String {
    let mut line = format!(
        "{:<24} {:<6} {:<36} {}",
        status.target.name(),
        status.target.kind,
        status.target.output.display(),
        freshness(&status.freshness)
    );
    if let Some(title) = title {
        line.push_str("  ");
        line.push_str(title);
    }
    line
}

fn freshness(freshness: &Freshness) -> String {
    match freshness {
        Freshness::Missing => "missing".to_string(),
        Freshness::Stale { newer } => format!("stale ({} changed)", newer.display()),
        Freshness::UpToDate => "up to date".to_string(),
    }
}

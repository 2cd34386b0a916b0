//! Build command.

use anyhow::Result;
use quire_build::{BuildDriver, BuildReport, Outcome, Settings};

/// Run the build command.
///
/// Fails when any target failed or was skipped, after every target has been
/// attempted.
pub async fn run(settings: Settings, targets: Vec<String>) -> Result<()> {
    let report = build(settings, targets).await?;

    if !report.success() {
        anyhow::bail!(
            "{} target(s) failed, {} skipped",
            report.failed(),
            report.skipped()
        );
    }

    Ok(())
}

/// Build `targets` on a blocking thread and log the summary.
pub async fn build(settings: Settings, targets: Vec<String>) -> Result<BuildReport> {
    let report = tokio::task::spawn_blocking(move || {
        BuildDriver::from_settings(settings).build(&targets)
    })
    .await??;

    summarize(&report);
    Ok(report)
}

/// Log per-target failures and the totals of a build.
pub fn summarize(report: &BuildReport) {
    for entry in &report.targets {
        match &entry.outcome {
            Outcome::Failed(_) => {
                tracing::warn!("{} {}", entry.target.output.display(), entry.outcome)
            }
            Outcome::Skipped => {
                tracing::debug!("{} {}", entry.target.output.display(), entry.outcome)
            }
            Outcome::Built | Outcome::UpToDate => {}
        }
    }

    tracing::info!(
        "{} built, {} up to date, {} failed, {} skipped in {}ms",
        report.built(),
        report.up_to_date(),
        report.failed(),
        report.skipped(),
        report.duration_ms
    );
}

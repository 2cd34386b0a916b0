//! quire CLI - incremental builder for papers and slide decks.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use config::Overrides;

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Incremental builder for papers and slide decks")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to quire.toml config file
    #[arg(short, long, default_value = "quire.toml", env = "QUIRE_CONFIG", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Subcommand)]
enum Commands {
    /// Build stale targets (the default)
    Build {
        /// Targets to build, by name, source or output path (all when empty)
        targets: Vec<String>,

        /// Stop scheduling targets after the first failure
        #[arg(long)]
        fail_fast: bool,
    },

    /// Remove rendered outputs and cached resources
    Clean,

    /// Fetch the citation database and normative snapshot again
    Update,

    /// List targets and whether they are up to date
    Targets,

    /// Print the composed options for a target
    Options {
        /// Target name, source or output path
        target: String,
    },

    /// Rebuild whenever a source or configuration layer changes
    Watch,

    /// Initialize a document repository in the current directory
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("QUIRE_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let command = cli.command.unwrap_or(Commands::Build {
        targets: Vec::new(),
        fail_fast: false,
    });

    let settings = || config::resolve(&cli.config, &cli.overrides);

    // Execute command
    match command {
        Commands::Init { yes } => commands::init::run(PathBuf::from("."), yes).await?,
        Commands::Build { targets, fail_fast } => {
            let mut settings = settings()?;
            settings.fail_fast |= fail_fast;
            commands::build::run(settings, targets).await?;
        }
        Commands::Clean => commands::clean::run(settings()?).await?,
        Commands::Update => commands::update::run(settings()?).await?,
        Commands::Targets => commands::targets::run(settings()?).await?,
        Commands::Options { target } => commands::options::run(settings()?, target).await?,
        Commands::Watch => commands::watch::run(settings()?).await?,
    }

    Ok(())
}

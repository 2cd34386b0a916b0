//! Settings resolution: built-in defaults, then `quire.toml`, then
//! environment variables and command-line flags.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use quire_build::Settings;
use serde::Deserialize;

/// Configuration file structure (quire.toml).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub inspect: InspectConfig,
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub build: BuildSettings,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Directory scanned for source documents
    pub source: Option<PathBuf>,
    /// Directory receiving rendered artifacts
    pub output: Option<PathBuf>,
    /// Directory holding cached resources
    pub cache: Option<PathBuf>,
    /// Engine defaults file; built-in defaults when absent
    pub engine_defaults: Option<PathBuf>,
    pub defaults: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct InspectConfig {
    pub interpreter: Option<PathBuf>,
    /// External TOC depth classifier script
    pub classifier: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ResourcesConfig {
    pub citation_script: Option<PathBuf>,
    pub snapshot_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    pub program: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BuildSettings {
    pub jobs: Option<usize>,
    #[serde(default)]
    pub fail_fast: bool,
}

/// Settings that can be given on the command line or through the
/// environment. These win over `quire.toml`.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Directory containing source documents
    #[arg(long, env = "QUIRE_SOURCE_DIR", global = true)]
    pub source_dir: Option<PathBuf>,

    /// Directory receiving rendered artifacts
    #[arg(long, env = "QUIRE_OUTPUT_DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    /// Directory holding cached resources
    #[arg(long, env = "QUIRE_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Engine defaults file
    #[arg(long, env = "QUIRE_ENGINE_DEFAULTS", global = true)]
    pub engine_defaults: Option<PathBuf>,

    /// Repository defaults file
    #[arg(long, env = "QUIRE_DEFAULTS", global = true)]
    pub defaults: Option<PathBuf>,

    /// Repository metadata file
    #[arg(long, env = "QUIRE_METADATA", global = true)]
    pub metadata: Option<PathBuf>,

    /// Interpreter for the classifier and citation scripts
    #[arg(long, env = "QUIRE_INTERPRETER", global = true)]
    pub interpreter: Option<PathBuf>,

    /// External TOC depth classifier script
    #[arg(long, env = "QUIRE_TOC_CLASSIFIER", global = true)]
    pub toc_classifier: Option<PathBuf>,

    /// Rendering engine executable
    #[arg(long, env = "QUIRE_RENDERER", global = true)]
    pub renderer: Option<PathBuf>,

    /// Maximum number of concurrent renders
    #[arg(short, long, env = "QUIRE_JOBS", global = true)]
    pub jobs: Option<usize>,
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::debug!("No {} found, using defaults", path.display());
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let config: ConfigFile = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
    tracing::debug!("Loaded config from {}", path.display());

    Ok(config)
}

/// Resolve the effective settings.
///
/// Relative paths in the config file are taken relative to the directory
/// containing it.
pub fn resolve(config_path: &Path, overrides: &Overrides) -> Result<Settings> {
    let file = load_config(config_path)?;
    let base = config_path.parent().unwrap_or(Path::new(""));
    Ok(merge(file, base, overrides))
}

fn merge(file: ConfigFile, base: &Path, overrides: &Overrides) -> Settings {
    let rel = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };
    let defaults = Settings::default();

    let ConfigFile {
        paths,
        inspect,
        resources,
        render,
        build,
    } = file;

    Settings {
        source_dir: overrides
            .source_dir
            .clone()
            .or(paths.source.map(rel))
            .unwrap_or_else(|| rel(defaults.source_dir)),
        output_dir: overrides
            .output_dir
            .clone()
            .or(paths.output.map(rel))
            .unwrap_or_else(|| rel(defaults.output_dir)),
        cache_dir: overrides
            .cache_dir
            .clone()
            .or(paths.cache.map(rel))
            .unwrap_or_else(|| rel(defaults.cache_dir)),
        engine_defaults: overrides
            .engine_defaults
            .clone()
            .or(paths.engine_defaults.map(rel)),
        repo_defaults: overrides.defaults.clone().or(paths.defaults.map(rel)),
        repo_metadata: overrides.metadata.clone().or(paths.metadata.map(rel)),
        interpreter: overrides
            .interpreter
            .clone()
            .or(inspect.interpreter)
            .unwrap_or(defaults.interpreter),
        toc_classifier: overrides
            .toc_classifier
            .clone()
            .or(inspect.classifier.map(rel)),
        citation_script: resources
            .citation_script
            .map(rel)
            .unwrap_or_else(|| rel(defaults.citation_script)),
        snapshot_url: resources.snapshot_url.unwrap_or(defaults.snapshot_url),
        renderer: overrides
            .renderer
            .clone()
            .or(render.program)
            .unwrap_or(defaults.renderer),
        renderer_args: render.args,
        jobs: overrides
            .jobs
            .or(build.jobs)
            .unwrap_or(defaults.jobs)
            .max(1),
        fail_fast: build.fail_fast,
    }
}

//! Build settings.

use std::path::PathBuf;

/// Default upstream of the normative-reference snapshot.
pub const DEFAULT_SNAPSHOT_URL: &str = "https://timsong-cpp.github.io/cppwp/annex-f";

/// Configuration for a build.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory containing source documents
    pub source_dir: PathBuf,

    /// Directory receiving rendered artifacts
    pub output_dir: PathBuf,

    /// Directory holding cached resources
    pub cache_dir: PathBuf,

    /// Engine defaults file; the built-in defaults are used when unset
    pub engine_defaults: Option<PathBuf>,

    /// Repository defaults file (`<source>/defaults.yaml` when unset)
    pub repo_defaults: Option<PathBuf>,

    /// Repository metadata file (`<source>/metadata.yaml` when unset)
    pub repo_metadata: Option<PathBuf>,

    /// Interpreter running the classifier and citation scripts
    pub interpreter: PathBuf,

    /// External TOC depth classifier; the in-process analyzer is used when unset
    pub toc_classifier: Option<PathBuf>,

    /// Script printing the citation database
    pub citation_script: PathBuf,

    /// Where the normative snapshot is downloaded from
    pub snapshot_url: String,

    /// Rendering engine executable
    pub renderer: PathBuf,

    /// Extra arguments passed to every render
    pub renderer_args: Vec<String>,

    /// Maximum number of concurrent renders
    pub jobs: usize,

    /// Stop scheduling targets after the first failure
    pub fail_fast: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            output_dir: PathBuf::from("generated"),
            cache_dir: PathBuf::from("data"),
            engine_defaults: None,
            repo_defaults: None,
            repo_metadata: None,
            interpreter: PathBuf::from("python3"),
            toc_classifier: None,
            citation_script: PathBuf::from("tools/citations.py"),
            snapshot_url: DEFAULT_SNAPSHOT_URL.to_string(),
            renderer: PathBuf::from("pandoc"),
            renderer_args: Vec::new(),
            jobs: default_jobs(),
            fail_fast: false,
        }
    }
}

impl Settings {
    /// Engine defaults location, materialized from the built-in copy when
    /// none is configured.
    pub fn engine_defaults_path(&self) -> PathBuf {
        self.engine_defaults
            .clone()
            .unwrap_or_else(|| self.builtin_engine_defaults_path())
    }

    /// Where the built-in engine defaults are written.
    pub fn builtin_engine_defaults_path(&self) -> PathBuf {
        self.cache_dir.join("engine-defaults.yaml")
    }

    pub fn repo_defaults_path(&self) -> PathBuf {
        self.repo_defaults
            .clone()
            .unwrap_or_else(|| self.source_dir.join("defaults.yaml"))
    }

    pub fn repo_metadata_path(&self) -> PathBuf {
        self.repo_metadata
            .clone()
            .unwrap_or_else(|| self.source_dir.join("metadata.yaml"))
    }
}

/// Worker count used when none is configured.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

//! Build driver.
//!
//! Resolves targets, makes sure the cached resources they need are present,
//! skips up-to-date outputs and renders the rest in parallel. A failing
//! target never prevents unrelated targets from building unless fail-fast is
//! enabled.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use walkdir::WalkDir;

use quire_inspect::{ExternalClassifier, HeadingDepthAnalyzer, Inspector};

use crate::cache::{required_resources, PARTIAL_SUFFIX, CacheError, HttpFetcher, ResourceCache, ResourceId, ScriptFetcher};
use crate::compose::{compose, ComposedOptions};
use crate::layers::{materialize_engine_defaults, LayerError, LayerSet};
use crate::render::{EngineRenderer, RenderJob, Renderer};
use crate::settings::Settings;
use crate::staleness::{dependencies, evaluate, Freshness};
use crate::targets::{resolve_targets, select, OutputFormat, Target, TargetError, TargetKind};

/// Errors that abort a whole build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Targets(#[from] TargetError),

    #[error(transparent)]
    Layers(#[from] LayerError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("I/O error at {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("Failed to start worker pool: {0}")]
    Pool(String),
}

/// What happened to one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Rendered during this run
    Built,
    /// Output already fresh
    UpToDate,
    /// Build failed; the message is the underlying diagnostic
    Failed(String),
    /// Not attempted because an earlier target failed in fail-fast mode
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Built => f.write_str("built"),
            Self::UpToDate => f.write_str("up to date"),
            Self::Failed(_) => f.write_str("failed"),
            Self::Skipped => f.write_str("skipped"),
        }
    }
}

/// Result for one target.
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub target: Target,
    pub outcome: Outcome,
}

/// Result of a build operation.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Per-target outcomes, in target order
    pub targets: Vec<TargetReport>,

    /// Total build time in milliseconds
    pub duration_ms: u64,
}

impl BuildReport {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.targets.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn built(&self) -> usize {
        self.count(|o| *o == Outcome::Built)
    }

    pub fn up_to_date(&self) -> usize {
        self.count(|o| *o == Outcome::UpToDate)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| *o == Outcome::Skipped)
    }

    /// True when no target failed or was skipped.
    pub fn success(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }
}

/// A target together with its current freshness.
#[derive(Debug, Clone)]
pub struct TargetStatus {
    pub target: Target,
    pub freshness: Freshness,
}

/// Orchestrates incremental builds.
pub struct BuildDriver {
    settings: Settings,
    cache: ResourceCache,
    inspector: Inspector,
    renderer: Box<dyn Renderer>,
}

impl BuildDriver {
    /// Create a driver from explicit collaborators.
    pub fn new(
        settings: Settings,
        cache: ResourceCache,
        inspector: Inspector,
        renderer: impl Renderer + 'static,
    ) -> Self {
        Self {
            settings,
            cache,
            inspector,
            renderer: Box::new(renderer),
        }
    }

    /// Create a driver with the collaborators described by `settings`.
    pub fn from_settings(settings: Settings) -> Self {
        let cache = ResourceCache::new(
            &settings.cache_dir,
            ScriptFetcher::new(&settings.interpreter, &settings.citation_script),
            HttpFetcher::new(&settings.snapshot_url),
        );

        let inspector = match &settings.toc_classifier {
            Some(script) => Inspector::new(ExternalClassifier::new(&settings.interpreter, script)),
            None => Inspector::new(HeadingDepthAnalyzer::new()),
        };

        let renderer = EngineRenderer::new(&settings.renderer, settings.renderer_args.clone());

        Self::new(settings, cache, inspector, renderer)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// All targets in the source directory.
    pub fn targets(&self) -> Result<Vec<Target>, BuildError> {
        Ok(resolve_targets(
            &self.settings.source_dir,
            &self.settings.output_dir,
        )?)
    }

    /// Locate and read the configuration layers of this build.
    pub fn load_layers(&self) -> Result<LayerSet, BuildError> {
        if self.settings.engine_defaults.is_none() {
            materialize_engine_defaults(&self.settings.builtin_engine_defaults_path())?;
        }

        Ok(LayerSet::load(
            &self.settings.engine_defaults_path(),
            &self.settings.repo_defaults_path(),
            &self.settings.repo_metadata_path(),
        )?)
    }

    /// Compose the options `target` would be rendered with.
    ///
    /// Papers are inspected for a TOC depth; slides never are.
    pub fn compose_for(&self, target: &Target, layers: &LayerSet) -> Result<ComposedOptions, BuildError> {
        let toc_depth = match target.kind {
            TargetKind::Paper => {
                let text = fs::read_to_string(&target.source).map_err(|e| BuildError::Io {
                    path: target.source.clone(),
                    message: e.to_string(),
                })?;
                self.inspector.inspect(&target.source, &text)
            }
            TargetKind::Slides => None,
        };

        Ok(compose(layers, target.kind, toc_depth))
    }

    /// Freshness of the requested targets, without fetching anything.
    ///
    /// Resources that are not cached yet are left out of the dependency set.
    pub fn plan(&self, requests: &[String]) -> Result<Vec<TargetStatus>, BuildError> {
        let targets = select(&self.targets()?, requests)?;
        let layer_files = self.load_layers()?.present_paths();

        targets
            .into_iter()
            .map(|target| {
                let resources: Vec<PathBuf> = required_resources(target.kind)
                    .iter()
                    .map(|id| self.cache.local_path(*id).to_path_buf())
                    .filter(|p| p.is_file())
                    .collect();
                let deps = dependencies(&target, &layer_files, &resources);
                let freshness = evaluate(&target.output, &deps).map_err(|e| BuildError::Io {
                    path: e.path.clone(),
                    message: e.message.clone(),
                })?;
                Ok(TargetStatus { target, freshness })
            })
            .collect()
    }

    /// Build the requested targets (all targets when `requests` is empty).
    pub fn build(&self, requests: &[String]) -> Result<BuildReport, BuildError> {
        let start = Instant::now();

        let targets = select(&self.targets()?, requests)?;
        let layers = self.load_layers()?;
        let layer_files = layers.present_paths();

        tracing::info!(
            "Checking {} target(s) with {} worker(s)",
            targets.len(),
            self.settings.jobs.max(1)
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.jobs.max(1))
            .build()
            .map_err(|e| BuildError::Pool(e.to_string()))?;

        let abort = AtomicBool::new(false);

        let reports: Vec<TargetReport> = pool.install(|| {
            targets
                .par_iter()
                .map(|target| {
                    if self.settings.fail_fast && abort.load(Ordering::SeqCst) {
                        return TargetReport {
                            target: target.clone(),
                            outcome: Outcome::Skipped,
                        };
                    }

                    let outcome = self.build_target(target, &layers, &layer_files);
                    if let Outcome::Failed(message) = &outcome {
                        tracing::error!("{}: {}", target.name(), message);
                        abort.store(true, Ordering::SeqCst);
                    }

                    TargetReport {
                        target: target.clone(),
                        outcome,
                    }
                })
                .collect()
        });

        Ok(BuildReport {
            targets: reports,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Build a single target.
    fn build_target(&self, target: &Target, layers: &LayerSet, layer_files: &[PathBuf]) -> Outcome {
        let mut resources = Vec::new();
        for id in required_resources(target.kind) {
            match self.cache.ensure(*id) {
                Ok(path) => resources.push((*id, path)),
                Err(e) => return Outcome::Failed(e.to_string()),
            }
        }

        let resource_paths: Vec<PathBuf> = resources.iter().map(|(_, p)| p.clone()).collect();
        let deps = dependencies(target, layer_files, &resource_paths);

        match evaluate(&target.output, &deps) {
            Ok(Freshness::UpToDate) => {
                tracing::debug!("{} is up to date", target.output.display());
                return Outcome::UpToDate;
            }
            Ok(Freshness::Missing) => {
                tracing::debug!("{} does not exist", target.output.display());
            }
            Ok(Freshness::Stale { newer }) => {
                tracing::debug!(
                    "{} is older than {}",
                    target.output.display(),
                    newer.display()
                );
            }
            Err(e) => return Outcome::Failed(e.to_string()),
        }

        let options = match self.compose_for(target, layers) {
            Ok(options) => options,
            Err(e) => return Outcome::Failed(e.to_string()),
        };

        if let Some(parent) = target.output.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                return Outcome::Failed(format!("{}: {}", parent.display(), e));
            }
        }

        let job = RenderJob {
            source: target.source.clone(),
            output: target.output.clone(),
            kind: target.kind,
            options,
            resources,
        };

        tracing::info!(
            "Rendering {} -> {}",
            target.source.display(),
            target.output.display()
        );

        match self.renderer.render(&job) {
            Ok(()) => Outcome::Built,
            Err(e) => {
                // A partial artifact would look newer than its sources.
                remove_if_exists(&target.output);
                Outcome::Failed(e.to_string())
            }
        }
    }

    /// Fetch both cached resources again.
    pub fn update(&self) -> Vec<(ResourceId, Result<PathBuf, CacheError>)> {
        ResourceId::ALL
            .into_iter()
            .map(|id| (id, self.cache.refresh(id)))
            .collect()
    }

    /// Remove every rendered output, the cached resources and the
    /// materialized engine defaults. Returns the removed paths.
    ///
    /// Outputs whose source no longer resolves to a target are found by
    /// sweeping the top level of the output directory for rendered formats.
    pub fn clean(&self) -> Result<Vec<PathBuf>, BuildError> {
        let mut removed = Vec::new();

        match self.targets() {
            Ok(targets) => {
                for target in targets {
                    if remove_file(&target.output)? {
                        removed.push(target.output);
                    }
                }
            }
            Err(e) => tracing::warn!("Not resolving targets: {}", e),
        }

        removed.extend(self.sweep_output_dir()?);

        removed.extend(self.cache.remove_all()?);

        if self.settings.engine_defaults.is_none() {
            let defaults = self.settings.builtin_engine_defaults_path();
            if remove_file(&defaults)? {
                removed.push(defaults);
            }
        }

        // Only succeeds for directories left empty.
        let _ = fs::remove_dir(&self.settings.output_dir);
        let _ = fs::remove_dir(&self.settings.cache_dir);

        Ok(removed)
    }
}

impl BuildDriver {
    /// Delete rendered artifacts and partial files left directly under the
    /// output directory.
    fn sweep_output_dir(&self) -> Result<Vec<PathBuf>, BuildError> {
        let output_dir = &self.settings.output_dir;
        let mut removed = Vec::new();
        if !output_dir.is_dir() {
            return Ok(removed);
        }

        for entry in WalkDir::new(output_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| BuildError::Io {
                path: output_dir.clone(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() || !is_generated(entry.path()) {
                continue;
            }

            tracing::debug!("Removing orphaned {}", entry.path().display());
            if remove_file(entry.path())? {
                removed.push(entry.into_path());
            }
        }

        Ok(removed)
    }
}

impl fmt::Debug for BuildDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildDriver")
            .field("settings", &self.settings)
            .field("cache", &self.cache)
            .field("inspector", &self.inspector)
            .field("renderer", &self.renderer.name())
            .finish()
    }
}

/// Delete `path` if it is a file. Returns whether anything was removed.
fn remove_file(path: &Path) -> Result<bool, BuildError> {
    if !path.is_file() {
        return Ok(false);
    }
    fs::remove_file(path).map_err(|e| BuildError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(true)
}

/// Whether `path` looks like something a build writes.
fn is_generated(path: &Path) -> bool {
    let partial = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(PARTIAL_SUFFIX));
    let rendered = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| OutputFormat::ALL.iter().any(|f| f.extension() == e));
    partial || rendered
}

fn remove_if_exists(path: &Path) {
    if let Err(e) = remove_file(path) {
        tracing::warn!("{}", e);
    }
}

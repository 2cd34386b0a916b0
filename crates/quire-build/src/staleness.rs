//! Dependency sets and staleness checks.
//!
//! An output is up to date iff it exists and no dependency has a modification
//! time strictly newer than it. Each target is judged on its own
//! dependencies only.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::targets::Target;

/// Whether a target needs rebuilding, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// The output does not exist yet
    Missing,
    /// A dependency changed after the output was written
    Stale { newer: PathBuf },
    /// Nothing to do
    UpToDate,
}

impl Freshness {
    pub fn needs_rebuild(&self) -> bool {
        !matches!(self, Self::UpToDate)
    }
}

/// Full dependency set of `target`: its source, every present layer file and
/// every cached resource it requires.
pub fn dependencies(target: &Target, layer_files: &[PathBuf], resources: &[PathBuf]) -> Vec<PathBuf> {
    let mut deps = Vec::with_capacity(1 + layer_files.len() + resources.len());
    deps.push(target.source.clone());
    deps.extend(layer_files.iter().cloned());
    deps.extend(resources.iter().cloned());
    deps
}

/// Compare `output` against its dependencies.
///
/// A dependency that cannot be stat'ed is an error; callers only pass paths
/// that are known to exist.
pub fn evaluate(output: &Path, deps: &[PathBuf]) -> Result<Freshness, StalenessError> {
    let output_time = match modified(output) {
        Ok(time) => time,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Freshness::Missing),
        Err(e) => return Err(StalenessError::new(output, e)),
    };

    for dep in deps {
        let dep_time = modified(dep).map_err(|e| StalenessError::new(dep, e))?;
        if dep_time > output_time {
            return Ok(Freshness::Stale { newer: dep.clone() });
        }
    }

    Ok(Freshness::UpToDate)
}

fn modified(path: &Path) -> io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

/// A dependency or output whose timestamp could not be read.
#[derive(Debug, thiserror::Error)]
#[error("Failed to read modification time of {}: {message}", .path.display())]
pub struct StalenessError {
    pub path: PathBuf,
    pub message: String,
}

impl StalenessError {
    fn new(path: &Path, err: io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

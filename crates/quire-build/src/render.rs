//! The external rendering engine.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_yaml::Value;

use crate::cache::ResourceId;
use crate::compose::ComposedOptions;
use crate::layers::LayerOrigin;
use crate::targets::TargetKind;

/// Metadata key under which the normative snapshot path is passed.
pub const SNAPSHOT_METADATA_KEY: &str = "normative-snapshot";

/// Everything the renderer needs for one target.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub source: PathBuf,
    pub output: PathBuf,
    pub kind: TargetKind,
    pub options: ComposedOptions,
    /// Local paths of the cached resources the target requires
    pub resources: Vec<(ResourceId, PathBuf)>,
}

impl RenderJob {
    pub fn resource(&self, id: ResourceId) -> Option<&Path> {
        self.resources
            .iter()
            .find(|(r, _)| *r == id)
            .map(|(_, p)| p.as_path())
    }
}

/// Errors reported by a renderer.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to spawn `{program}`: {message}")]
    Spawn { program: String, message: String },

    #[error("Renderer exited with {status}:\n{diagnostic}")]
    Failed { status: String, diagnostic: String },

    #[error("Renderer reported success but wrote no {}", .0.display())]
    MissingOutput(PathBuf),
}

/// Produces a rendered artifact from a source document.
pub trait Renderer: Send + Sync {
    /// Renderer identifier, for logs.
    fn name(&self) -> &str;

    /// Render `job.source` to `job.output`.
    fn render(&self, job: &RenderJob) -> Result<(), RenderError>;
}

/// Invokes an external document converter (pandoc by default).
#[derive(Debug, Clone)]
pub struct EngineRenderer {
    /// Converter executable
    pub program: PathBuf,

    /// Arguments appended after the generated ones
    pub extra_args: Vec<String>,
}

impl Default for EngineRenderer {
    fn default() -> Self {
        Self {
            program: PathBuf::from("pandoc"),
            extra_args: Vec::new(),
        }
    }
}

impl EngineRenderer {
    pub fn new(program: impl Into<PathBuf>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extra_args,
        }
    }

    /// Command-line arguments for `job`.
    pub fn args(&self, job: &RenderJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            job.source.clone().into(),
            "--output".into(),
            job.output.clone().into(),
        ];

        for layer in &job.options.layers {
            let flag = match layer.origin {
                LayerOrigin::EngineDefaults | LayerOrigin::RepoDefaults => "--defaults",
                LayerOrigin::RepoMetadata => "--metadata-file",
            };
            args.push(flag.into());
            args.push(layer.path.clone().into());
        }

        if let Some(citations) = job.resource(ResourceId::Citations) {
            args.push("--bibliography".into());
            args.push(citations.into());
        }

        if let Some(snapshot) = job.resource(ResourceId::NormativeSnapshot) {
            let mut arg = OsString::from(format!("--metadata={}:", SNAPSHOT_METADATA_KEY));
            arg.push(snapshot);
            args.push(arg);
        }

        for (key, value) in &job.options.overrides {
            if let (Some(key), Some(value)) = (key.as_str(), scalar(value)) {
                args.push(format!("--{}={}", key, value).into());
            }
        }

        args.extend(self.extra_args.iter().map(OsString::from));
        args
    }
}

impl Renderer for EngineRenderer {
    fn name(&self) -> &str {
        self.program.to_str().unwrap_or("renderer")
    }

    fn render(&self, job: &RenderJob) -> Result<(), RenderError> {
        let output = Command::new(&self.program)
            .args(self.args(job))
            .output()
            .map_err(|e| RenderError::Spawn {
                program: self.program.display().to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let mut diagnostic = String::from_utf8_lossy(&output.stderr).into_owned();
            if diagnostic.trim().is_empty() {
                diagnostic = String::from_utf8_lossy(&output.stdout).into_owned();
            }
            return Err(RenderError::Failed {
                status: output.status.to_string(),
                diagnostic: diagnostic.trim_end().to_string(),
            });
        }

        if !job.output.is_file() {
            return Err(RenderError::MissingOutput(job.output.clone()));
        }

        Ok(())
    }
}

/// Format a scalar option value for the command line.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

//! Configuration layers.
//!
//! Three fixed layers feed every build, lowest precedence first: the engine
//! defaults, the repository defaults and the repository metadata. Only the
//! engine defaults are mandatory.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

/// Engine defaults shipped with quire, used when no engine defaults file is
/// configured.
pub const BUILTIN_ENGINE_DEFAULTS: &str = r#"# quire engine defaults
from: markdown+emoji-smart
standalone: true
number-sections: true
citeproc: true
html-math-method: mathjax
metadata:
  link-citations: true
  lang: en
"#;

/// Where a layer comes from. Variants are declared in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerOrigin {
    EngineDefaults,
    RepoDefaults,
    RepoMetadata,
}

impl LayerOrigin {
    /// All origins, lowest precedence first.
    pub const ALL: [LayerOrigin; 3] = [
        LayerOrigin::EngineDefaults,
        LayerOrigin::RepoDefaults,
        LayerOrigin::RepoMetadata,
    ];

    /// Precedence rank; higher ranks override lower ones.
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Whether the build fails when this layer is absent.
    pub fn is_required(self) -> bool {
        matches!(self, Self::EngineDefaults)
    }
}

impl fmt::Display for LayerOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EngineDefaults => f.write_str("engine-defaults"),
            Self::RepoDefaults => f.write_str("repo-defaults"),
            Self::RepoMetadata => f.write_str("repo-metadata"),
        }
    }
}

/// One configuration layer slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayer {
    pub origin: LayerOrigin,

    /// Location the layer is read from
    pub path: PathBuf,

    /// Whether the file exists
    pub present: bool,

    /// Parsed options (empty when absent)
    pub options: Mapping,
}

impl ConfigLayer {
    /// Locate and read a layer. An absent optional layer is not an error.
    pub fn load(origin: LayerOrigin, path: &Path) -> Result<Self, LayerError> {
        if !path.is_file() {
            if origin.is_required() {
                return Err(LayerError::Missing {
                    origin,
                    path: path.to_path_buf(),
                });
            }
            tracing::debug!("No {} layer at {}", origin, path.display());
            return Ok(Self {
                origin,
                path: path.to_path_buf(),
                present: false,
                options: Mapping::new(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| LayerError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Self {
            origin,
            path: path.to_path_buf(),
            present: true,
            options: parse_options(&content).map_err(|message| LayerError::Parse {
                path: path.to_path_buf(),
                message,
            })?,
        })
    }
}

/// Parse a layer document into an option mapping.
pub fn parse_options(content: &str) -> Result<Mapping, String> {
    let blank = content.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    });
    if blank {
        return Ok(Mapping::new());
    }

    match serde_yaml::from_str::<Value>(content).map_err(|e| e.to_string())? {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(map) => Ok(map),
        other => Err(format!(
            "expected a mapping of option names, found {}",
            describe(&other)
        )),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// The three layers of one build, in precedence order.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSet {
    layers: Vec<ConfigLayer>,
}

impl LayerSet {
    /// Read all three layer slots.
    pub fn load(
        engine_defaults: &Path,
        repo_defaults: &Path,
        repo_metadata: &Path,
    ) -> Result<Self, LayerError> {
        let layers = vec![
            ConfigLayer::load(LayerOrigin::EngineDefaults, engine_defaults)?,
            ConfigLayer::load(LayerOrigin::RepoDefaults, repo_defaults)?,
            ConfigLayer::load(LayerOrigin::RepoMetadata, repo_metadata)?,
        ];
        Ok(Self { layers })
    }

    /// Build a set from already-loaded layers, ordering them by precedence.
    pub fn from_layers(mut layers: Vec<ConfigLayer>) -> Self {
        layers.sort_by_key(|l| l.origin.rank());
        Self { layers }
    }

    /// Every slot, present or not, lowest precedence first.
    pub fn all(&self) -> &[ConfigLayer] {
        &self.layers
    }

    /// Present layers, lowest precedence first.
    pub fn present(&self) -> impl Iterator<Item = &ConfigLayer> {
        self.layers.iter().filter(|l| l.present)
    }

    /// Paths of present layers, lowest precedence first.
    pub fn present_paths(&self) -> Vec<PathBuf> {
        self.present().map(|l| l.path.clone()).collect()
    }

    pub fn get(&self, origin: LayerOrigin) -> Option<&ConfigLayer> {
        self.layers.iter().find(|l| l.origin == origin)
    }
}

/// Write the built-in engine defaults to `path` unless it already holds them.
///
/// Leaving an identical file untouched keeps its mtime stable, so existing
/// outputs stay fresh.
pub fn materialize_engine_defaults(path: &Path) -> Result<(), LayerError> {
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == BUILTIN_ENGINE_DEFAULTS {
            return Ok(());
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| LayerError::Write {
            path: parent.to_path_buf(),
            message: e.to_string(),
        })?;
    }

    fs::write(path, BUILTIN_ENGINE_DEFAULTS).map_err(|e| LayerError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    tracing::debug!("Wrote engine defaults to {}", path.display());

    Ok(())
}

/// Errors that can occur while loading configuration layers.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error("Required {origin} layer not found: {}", .path.display())]
    Missing { origin: LayerOrigin, path: PathBuf },

    #[error("Failed to read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Failed to write {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn builtin_defaults_parse() {
        let options = parse_options(BUILTIN_ENGINE_DEFAULTS).unwrap();

        assert_eq!(options.get("standalone"), Some(&Value::Bool(true)));
        assert!(options.get("to").is_none());
    }

    #[test]
    fn origins_are_ranked() {
        assert!(LayerOrigin::EngineDefaults.rank() < LayerOrigin::RepoDefaults.rank());
        assert!(LayerOrigin::RepoDefaults.rank() < LayerOrigin::RepoMetadata.rank());
    }

    #[test]
    fn absent_optional_layers_are_skipped() {
        let temp = tempdir().unwrap();
        let engine = temp.path().join("engine.yaml");
        fs::write(&engine, "standalone: true\n").unwrap();

        let set = LayerSet::load(
            &engine,
            &temp.path().join("defaults.yaml"),
            &temp.path().join("metadata.yaml"),
        )
        .unwrap();

        assert_eq!(set.all().len(), 3);
        assert_eq!(set.present_paths(), vec![engine]);
        assert!(!set.get(LayerOrigin::RepoMetadata).unwrap().present);
    }

    #[test]
    fn missing_engine_defaults_is_an_error() {
        let temp = tempdir().unwrap();

        let result = ConfigLayer::load(LayerOrigin::EngineDefaults, &temp.path().join("nope.yaml"));

        assert!(matches!(result, Err(LayerError::Missing { .. })));
    }

    #[test]
    fn malformed_layer_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("defaults.yaml");
        fs::write(&path, "- just\n- a list\n").unwrap();

        let result = ConfigLayer::load(LayerOrigin::RepoDefaults, &path);

        assert!(matches!(result, Err(LayerError::Parse { .. })));
    }

    #[test]
    fn empty_layer_has_no_options() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("metadata.yaml");
        fs::write(&path, "# nothing yet\n").unwrap();

        let layer = ConfigLayer::load(LayerOrigin::RepoMetadata, &path).unwrap();

        assert!(layer.present);
        assert!(layer.options.is_empty());
    }

    #[test]
    fn materializing_twice_keeps_the_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("cache/engine-defaults.yaml");

        materialize_engine_defaults(&path).unwrap();
        let first = fs::metadata(&path).unwrap().modified().unwrap();
        materialize_engine_defaults(&path).unwrap();
        let second = fs::metadata(&path).unwrap().modified().unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(&path).unwrap(), BUILTIN_ENGINE_DEFAULTS);
    }
}

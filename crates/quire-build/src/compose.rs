//! Configuration composition.
//!
//! Folds the present layers of a [`LayerSet`] into one option set and adds
//! the per-target options: the slide backend for decks and the inspected
//! TOC depth for papers.

use std::path::PathBuf;

use serde_yaml::{Mapping, Value};

use quire_inspect::TocDepth;

use crate::layers::{LayerOrigin, LayerSet};
use crate::targets::TargetKind;

/// Option selecting the rendering backend.
pub const BACKEND_KEY: &str = "to";

/// Backend used for slide decks.
pub const SLIDES_BACKEND: &str = "beamer";

/// Option bounding the generated table of contents.
pub const TOC_DEPTH_KEY: &str = "toc-depth";

/// Key under which the engine reads document metadata. The repo-metadata
/// layer is handed over as a metadata file, so its options land here.
pub const METADATA_KEY: &str = "metadata";

/// A present layer file, as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerFile {
    pub origin: LayerOrigin,
    pub path: PathBuf,
}

/// The flattened options for one target.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedOptions {
    /// Present layer files, lowest precedence first
    pub layers: Vec<LayerFile>,

    /// Options injected on top of every layer
    pub overrides: Mapping,

    /// Result of merging every layer and then the overrides, shaped as the
    /// engine sees it: repo-metadata options sit under `metadata`
    pub merged: Mapping,
}

impl ComposedOptions {
    /// Look up a merged top-level option.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.merged.get(key)
    }
}

/// Compose the options for a target of `kind`.
///
/// Deterministic and free of I/O. `toc_depth` is only applied to papers.
pub fn compose(layers: &LayerSet, kind: TargetKind, toc_depth: Option<TocDepth>) -> ComposedOptions {
    let mut merged = Mapping::new();
    let mut files = Vec::new();

    for layer in layers.present() {
        match layer.origin {
            LayerOrigin::RepoMetadata => {
                let mut nested = Mapping::new();
                nested.insert(METADATA_KEY.into(), Value::Mapping(layer.options.clone()));
                merge(&mut merged, &nested);
            }
            LayerOrigin::EngineDefaults | LayerOrigin::RepoDefaults => {
                merge(&mut merged, &layer.options);
            }
        }
        files.push(LayerFile {
            origin: layer.origin,
            path: layer.path.clone(),
        });
    }

    let mut overrides = Mapping::new();
    match kind {
        TargetKind::Slides => {
            overrides.insert(BACKEND_KEY.into(), SLIDES_BACKEND.into());
        }
        TargetKind::Paper => {
            if let Some(depth) = toc_depth {
                overrides.insert(TOC_DEPTH_KEY.into(), Value::from(depth.get()));
            }
        }
    }
    merge(&mut merged, &overrides);

    ComposedOptions {
        layers: files,
        overrides,
        merged,
    }
}

/// Merge `overlay` into `base`.
///
/// Keys of `overlay` win. Nested mappings are merged key by key; lists and
/// scalars are replaced wholesale.
pub fn merge(base: &mut Mapping, overlay: &Mapping) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Mapping(existing)), Value::Mapping(incoming)) => {
                merge(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

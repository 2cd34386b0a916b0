//! Graceful wrapper around a [`ContentAnalyzer`].

use std::path::Path;

use crate::traits::{ContentAnalyzer, TocDepth};

/// Runs an analyzer and turns every failure into "no recommendation".
pub struct Inspector {
    analyzer: Box<dyn ContentAnalyzer>,
}

impl Inspector {
    pub fn new(analyzer: impl ContentAnalyzer + 'static) -> Self {
        Self {
            analyzer: Box::new(analyzer),
        }
    }

    /// Name of the wrapped analyzer.
    pub fn analyzer_name(&self) -> &'static str {
        self.analyzer.name()
    }

    /// Recommend a TOC depth for the document at `source`.
    ///
    /// `source` is only used for diagnostics.
    pub fn inspect(&self, source: &Path, text: &str) -> Option<TocDepth> {
        match self.analyzer.toc_depth(text) {
            Ok(Some(depth)) => {
                tracing::debug!(
                    "{}: toc depth {} ({})",
                    source.display(),
                    depth,
                    self.analyzer.name()
                );
                Some(depth)
            }
            Ok(None) => {
                tracing::debug!("{}: no toc depth recommendation", source.display());
                None
            }
            Err(e) => {
                tracing::warn!(
                    "{}: {} analyzer failed, rendering without toc depth: {}",
                    source.display(),
                    self.analyzer.name(),
                    e
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for Inspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inspector")
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}

//! Trait definitions for content analyzers.

use std::fmt;
use std::num::NonZeroU8;

/// Deepest heading level to include in a generated table of contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TocDepth(NonZeroU8);

impl TocDepth {
    /// Largest depth a renderer understands (heading levels 1-6).
    pub const MAX: u8 = 6;

    /// Create a depth, rejecting zero and anything past [`TocDepth::MAX`].
    pub fn new(depth: u8) -> Option<Self> {
        if depth > Self::MAX {
            return None;
        }
        NonZeroU8::new(depth).map(Self)
    }

    pub fn get(self) -> u8 {
        self.0.get()
    }
}

impl fmt::Display for TocDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur while analyzing a document.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("Failed to spawn classifier `{program}`: {message}")]
    Spawn { program: String, message: String },

    #[error("Classifier exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Classifier produced unusable output: {0:?}")]
    InvalidOutput(String),

    #[error("Failed to parse document: {0}")]
    Parse(String),
}

/// Derives rendering options from the text of a single document.
///
/// Implementations are interchangeable: the composer only ever sees the
/// optional value they return.
pub trait ContentAnalyzer: Send + Sync {
    /// Analyzer identifier (e.g., "headings", "external")
    fn name(&self) -> &'static str;

    /// Recommend a table-of-contents depth for `text`.
    ///
    /// `Ok(None)` means the analyzer ran but has no recommendation.
    fn toc_depth(&self, text: &str) -> Result<Option<TocDepth>, AnalyzeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_bounds() {
        assert!(TocDepth::new(0).is_none());
        assert_eq!(TocDepth::new(1).map(TocDepth::get), Some(1));
        assert_eq!(TocDepth::new(6).map(TocDepth::get), Some(6));
        assert!(TocDepth::new(7).is_none());
    }

    #[test]
    fn depth_displays_as_number() {
        assert_eq!(TocDepth::new(3).unwrap().to_string(), "3");
    }
}

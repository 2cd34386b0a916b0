//! In-process analyzer reading the document's own heading structure.

use quire_doc::parse_document;

use crate::traits::{AnalyzeError, ContentAnalyzer, TocDepth};

/// Recommends the deepest heading level present in the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadingDepthAnalyzer;

impl HeadingDepthAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl ContentAnalyzer for HeadingDepthAnalyzer {
    fn name(&self) -> &'static str {
        "headings"
    }

    fn toc_depth(&self, text: &str) -> Result<Option<TocDepth>, AnalyzeError> {
        let doc = parse_document(text).map_err(|e| AnalyzeError::Parse(e.to_string()))?;
        Ok(doc.max_heading_level().and_then(TocDepth::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = r#"---
title: Nested
---

# Introduction

## Design

### Alternatives considered

# Wording
"#;

    const FLAT: &str = r#"---
title: Flat
---

# Introduction

# Wording
"#;

    #[test]
    fn distinguishes_nested_from_flat() {
        let analyzer = HeadingDepthAnalyzer::new();

        let nested = analyzer.toc_depth(NESTED).unwrap();
        let flat = analyzer.toc_depth(FLAT).unwrap();

        assert_eq!(nested.map(TocDepth::get), Some(3));
        assert_eq!(flat.map(TocDepth::get), Some(1));
    }

    #[test]
    fn no_headings_means_no_recommendation() {
        let analyzer = HeadingDepthAnalyzer::new();

        assert_eq!(analyzer.toc_depth("just prose").unwrap(), None);
    }

    #[test]
    fn broken_front_matter_is_an_error() {
        let analyzer = HeadingDepthAnalyzer::new();

        let result = analyzer.toc_depth("---\ntitle: [oops\n---\n# A");

        assert!(matches!(result, Err(AnalyzeError::Parse(_))));
    }
}

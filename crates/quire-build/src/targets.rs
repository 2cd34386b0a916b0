//! Target discovery and classification.
//!
//! A repository is either single-document (every document is a paper) or
//! multi-document (only `P1234`-style papers are papers). `slides-*` decks
//! are slides under both shapes. The shape is inferred from the filenames
//! alone.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

/// Source extensions considered documents.
const SOURCE_EXTENSIONS: &[&str] = &["md", "markdown"];

/// File stems that are never targets, compared case-insensitively.
const EXCLUDED_STEMS: &[&str] = &[
    "readme",
    "license",
    "contributing",
    "changelog",
    "code_of_conduct",
];

/// What a source document builds into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Standalone paper rendered to HTML
    Paper,
    /// Slide deck rendered to PDF
    Slides,
}

impl TargetKind {
    pub fn output_format(self) -> OutputFormat {
        match self {
            Self::Paper => OutputFormat::Html,
            Self::Slides => OutputFormat::Pdf,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paper => f.pad("paper"),
            Self::Slides => f.pad("slides"),
        }
    }
}

/// Rendered artifact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Html,
    Pdf,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Html, OutputFormat::Pdf];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }
}

/// Naming scheme in use by a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoShape {
    /// One document per repository; every non-excluded document is a paper
    Single,
    /// Several documents; only prefixed files are targets
    Multi,
}

impl RepoShape {
    /// Infer the shape from the stems of all candidate documents.
    ///
    /// Only paper-numbered stems select the multi-document scheme; a slide
    /// deck next to a single paper leaves the paper in place.
    pub fn detect<'a>(stems: impl IntoIterator<Item = &'a str>) -> Self {
        let multi = stems
            .into_iter()
            .filter(|s| !is_excluded(s))
            .any(|s| PAPER_PATTERN.is_match(s));

        if multi {
            Self::Multi
        } else {
            Self::Single
        }
    }
}

/// One source document and its rendered output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    /// Source document
    pub source: PathBuf,

    /// Rendered artifact
    pub output: PathBuf,

    /// Paper or slides
    pub kind: TargetKind,
}

impl Target {
    /// Target name as shown to users (the source file stem).
    pub fn name(&self) -> &str {
        self.source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }
}

static PAPER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[PDN]\d{4}(R\d+)?$").expect("Invalid paper pattern"));

static SLIDES_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^slides-[\w.-]+$").expect("Invalid slides pattern"));

/// Whether a stem is on the exclusion list.
pub fn is_excluded(stem: &str) -> bool {
    EXCLUDED_STEMS
        .iter()
        .any(|excluded| stem.eq_ignore_ascii_case(excluded))
}

/// Classify a document stem under the given repository shape.
///
/// Returns `None` for excluded files and, in a multi-document repository,
/// for files matching neither naming pattern.
pub fn classify(stem: &str, shape: RepoShape) -> Option<TargetKind> {
    if is_excluded(stem) {
        return None;
    }

    if SLIDES_PATTERN.is_match(stem) {
        return Some(TargetKind::Slides);
    }

    match shape {
        RepoShape::Single => Some(TargetKind::Paper),
        RepoShape::Multi if PAPER_PATTERN.is_match(stem) => Some(TargetKind::Paper),
        RepoShape::Multi => None,
    }
}

/// Output path for a source document of the given kind.
pub fn output_path(source: &Path, kind: TargetKind, output_dir: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("index");

    output_dir.join(format!("{}.{}", stem, kind.output_format().extension()))
}

/// Errors that can occur while resolving targets.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("Source directory not found: {0}")]
    SourceDirNotFound(String),

    #[error("Failed to read source directory: {0}")]
    ReadError(String),

    #[error("No target matches '{0}'")]
    UnknownTarget(String),
}

/// Discover all targets in `source_dir`.
///
/// Only top-level documents are considered. Targets are sorted by source
/// path and deduplicated by output path; the first source wins.
pub fn resolve_targets(source_dir: &Path, output_dir: &Path) -> Result<Vec<Target>, TargetError> {
    if !source_dir.is_dir() {
        return Err(TargetError::SourceDirNotFound(
            source_dir.display().to_string(),
        ));
    }

    let mut documents = Vec::new();

    for entry in WalkDir::new(source_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| TargetError::ReadError(e.to_string()))?;
        let path = entry.path();

        if !entry.file_type().is_file() {
            continue;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !SOURCE_EXTENSIONS.contains(&ext) {
            continue;
        }

        documents.push(path.to_path_buf());
    }

    let stems: Vec<&str> = documents
        .iter()
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()))
        .collect();
    let shape = RepoShape::detect(stems.iter().copied());
    tracing::debug!("Detected {:?} repository shape", shape);

    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for source in documents {
        let Some(stem) = source.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let Some(kind) = classify(stem, shape) else {
            tracing::debug!("Skipping non-target {}", source.display());
            continue;
        };

        let output = output_path(&source, kind, output_dir);
        if !seen.insert(output.clone()) {
            tracing::warn!(
                "Ignoring {}: {} is already produced by another source",
                source.display(),
                output.display()
            );
            continue;
        }

        targets.push(Target {
            source,
            output,
            kind,
        });
    }

    Ok(targets)
}

/// Pick the targets named by `requests`.
///
/// A request matches a target by source path, output path, or bare name
/// (`P1234`). An empty request list selects every target.
pub fn select(targets: &[Target], requests: &[String]) -> Result<Vec<Target>, TargetError> {
    if requests.is_empty() {
        return Ok(targets.to_vec());
    }

    let mut selected: Vec<Target> = Vec::new();

    for request in requests {
        let wanted = Path::new(request);
        let target = targets
            .iter()
            .find(|t| {
                t.name() == request
                    || paths_match(&t.source, wanted)
                    || paths_match(&t.output, wanted)
            })
            .ok_or_else(|| TargetError::UnknownTarget(request.clone()))?;

        if !selected.contains(target) {
            selected.push(target.clone());
        }
    }

    Ok(selected)
}

/// Compare paths ignoring a leading `./` on either side.
fn paths_match(a: &Path, b: &Path) -> bool {
    let strip = |p: &Path| p.strip_prefix(".").unwrap_or(p).to_path_buf();
    strip(a) == strip(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn classifies_multi_document_names() {
        let shape = RepoShape::Multi;

        assert_eq!(classify("P1234", shape), Some(TargetKind::Paper));
        assert_eq!(classify("D2300R10", shape), Some(TargetKind::Paper));
        assert_eq!(classify("N4861", shape), Some(TargetKind::Paper));
        assert_eq!(classify("slides-foo", shape), Some(TargetKind::Slides));
        assert_eq!(classify("notes", shape), None);
        assert_eq!(classify("P12", shape), None);
    }

    #[test]
    fn single_document_shape_accepts_any_name() {
        assert_eq!(classify("my-paper", RepoShape::Single), Some(TargetKind::Paper));
        assert_eq!(classify("README", RepoShape::Single), None);
        assert_eq!(classify("License", RepoShape::Single), None);
    }

    #[test]
    fn detects_shape_from_filenames() {
        assert_eq!(RepoShape::detect(["paper", "README"]), RepoShape::Single);
        assert_eq!(RepoShape::detect(["P1234", "notes"]), RepoShape::Multi);
        assert_eq!(RepoShape::detect(["proposal", "slides-intro"]), RepoShape::Single);
        assert_eq!(RepoShape::detect(["P1234", "slides-intro"]), RepoShape::Multi);
    }

    #[test]
    fn computes_output_paths() {
        let out = Path::new("generated");

        assert_eq!(
            output_path(Path::new("src/P1234.md"), TargetKind::Paper, out),
            PathBuf::from("generated/P1234.html")
        );
        assert_eq!(
            output_path(Path::new("slides-foo.md"), TargetKind::Slides, out),
            PathBuf::from("generated/slides-foo.pdf")
        );
    }

    #[test]
    fn resolves_multi_document_repository() {
        let temp = tempdir().unwrap();
        let src = temp.path();
        for name in ["P1234.md", "slides-foo.md", "README.md", "notes.md", "data.yaml"] {
            fs::write(src.join(name), "# x").unwrap();
        }
        fs::create_dir_all(src.join("drafts")).unwrap();
        fs::write(src.join("drafts/P9999.md"), "# nested").unwrap();

        let out = src.join("generated");
        let targets = resolve_targets(src, &out).unwrap();

        assert_eq!(
            targets,
            vec![
                Target {
                    source: src.join("P1234.md"),
                    output: out.join("P1234.html"),
                    kind: TargetKind::Paper,
                },
                Target {
                    source: src.join("slides-foo.md"),
                    output: out.join("slides-foo.pdf"),
                    kind: TargetKind::Slides,
                },
            ]
        );
    }

    #[test]
    fn resolves_single_document_repository() {
        let temp = tempdir().unwrap();
        let src = temp.path();
        fs::write(src.join("proposal.md"), "# x").unwrap();
        fs::write(src.join("LICENSE.md"), "MIT").unwrap();

        let targets = resolve_targets(src, &src.join("out")).unwrap();

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].kind, TargetKind::Paper);
        assert_eq!(targets[0].name(), "proposal");
    }

    #[test]
    fn companion_deck_keeps_single_paper() {
        let temp = tempdir().unwrap();
        let src = temp.path();
        fs::write(src.join("proposal.md"), "# x").unwrap();
        fs::write(src.join("slides-proposal.md"), "# y").unwrap();

        let out = src.join("out");
        let targets = resolve_targets(src, &out).unwrap();

        assert_eq!(
            targets,
            vec![
                Target {
                    source: src.join("proposal.md"),
                    output: out.join("proposal.html"),
                    kind: TargetKind::Paper,
                },
                Target {
                    source: src.join("slides-proposal.md"),
                    output: out.join("slides-proposal.pdf"),
                    kind: TargetKind::Slides,
                },
            ]
        );
    }

    #[test]
    fn deduplicates_by_output_path() {
        let temp = tempdir().unwrap();
        let src = temp.path();
        fs::write(src.join("P1234.markdown"), "# a").unwrap();
        fs::write(src.join("P1234.md"), "# b").unwrap();

        let targets = resolve_targets(src, &src.join("out")).unwrap();

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].source, src.join("P1234.markdown"));
    }

    #[test]
    fn missing_source_dir_is_an_error() {
        let result = resolve_targets(Path::new("/nonexistent/quire"), Path::new("out"));

        assert!(matches!(result, Err(TargetError::SourceDirNotFound(_))));
    }

    #[test]
    fn selects_by_name_source_or_output() {
        let targets = vec![
            Target {
                source: PathBuf::from("P1234.md"),
                output: PathBuf::from("generated/P1234.html"),
                kind: TargetKind::Paper,
            },
            Target {
                source: PathBuf::from("slides-foo.md"),
                output: PathBuf::from("generated/slides-foo.pdf"),
                kind: TargetKind::Slides,
            },
        ];

        let by_output = select(&targets, &["generated/slides-foo.pdf".to_string()]).unwrap();
        assert_eq!(by_output, vec![targets[1].clone()]);

        let by_source = select(&targets, &["./P1234.md".to_string(), "P1234".to_string()]).unwrap();
        assert_eq!(by_source, vec![targets[0].clone()]);

        assert_eq!(select(&targets, &[]).unwrap().len(), 2);
        assert!(matches!(
            select(&targets, &["P0000".to_string()]),
            Err(TargetError::UnknownTarget(_))
        ));
    }
}

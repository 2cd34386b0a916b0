//! Analyzer delegating to an external classifier process.
//!
//! The classifier receives the document text on stdin and prints a single
//! integer on stdout. Printing nothing means "no recommendation".

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::traits::{AnalyzeError, ContentAnalyzer, TocDepth};

/// Runs `interpreter script` once per document.
#[derive(Debug, Clone)]
pub struct ExternalClassifier {
    /// Interpreter used to run the script (e.g. `python3`)
    pub interpreter: PathBuf,

    /// Classifier script path
    pub script: PathBuf,
}

impl ExternalClassifier {
    pub fn new(interpreter: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
        }
    }
}

impl ContentAnalyzer for ExternalClassifier {
    fn name(&self) -> &'static str {
        "external"
    }

    fn toc_depth(&self, text: &str) -> Result<Option<TocDepth>, AnalyzeError> {
        let mut child = Command::new(&self.interpreter)
            .arg(&self.script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AnalyzeError::Spawn {
                program: self.interpreter.display().to_string(),
                message: e.to_string(),
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| AnalyzeError::Spawn {
            program: self.interpreter.display().to_string(),
            message: "failed to capture stdin".to_string(),
        })?;

        // stdout is drained by wait_with_output while this thread writes.
        let input = text.to_string();
        let writer = std::thread::spawn(move || {
            // Early exit closes the pipe; the exit status decides.
            let _ = stdin.write_all(input.as_bytes());
        });

        let output = child.wait_with_output().map_err(|e| AnalyzeError::Spawn {
            program: self.interpreter.display().to_string(),
            message: e.to_string(),
        })?;
        let _ = writer.join();

        if !output.status.success() {
            return Err(AnalyzeError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_depth(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Interpret classifier stdout.
fn parse_depth(stdout: &str) -> Result<Option<TocDepth>, AnalyzeError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    trimmed
        .parse::<u8>()
        .ok()
        .and_then(TocDepth::new)
        .map(Some)
        .ok_or_else(|| AnalyzeError::InvalidOutput(trimmed.to_string()))
}

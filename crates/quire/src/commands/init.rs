//! Initialize a document repository.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Run the init command in `root`.
///
/// Existing files are left alone unless `yes` is set.
pub async fn run(root: PathBuf, yes: bool) -> Result<()> {
    tracing::info!("Initializing quire in {}...", root.display());

    fs::create_dir_all(&root)
        .with_context(|| format!("Failed to create {}", root.display()))?;

    let mut created = 0;
    for (name, content) in FILES {
        if write_file(&root, name, content, yes)? {
            created += 1;
        }
    }

    tracing::info!("Initialization complete! ({} file(s) written)", created);
    tracing::info!("Run 'quire build' to render P0000.md.");

    Ok(())
}

const FILES: [(&str, &str); 4] = [
    ("quire.toml", DEFAULT_CONFIG),
    ("defaults.yaml", DEFAULT_DEFAULTS),
    ("metadata.yaml", DEFAULT_METADATA),
    ("P0000.md", DEFAULT_PAPER),
];

fn write_file(root: &Path, name: &str, content: &str, overwrite: bool) -> Result<bool> {
    let path = root.join(name);
    if path.exists() && !overwrite {
        tracing::warn!("{} already exists. Use --yes to overwrite.", name);
        return Ok(false);
    }

    fs::write(&path, content).with_context(|| format!("Failed to write {}", name))?;
    tracing::info!("Created {}", name);
    Ok(true)
}

const DEFAULT_CONFIG: &str = r#"# quire configuration

[paths]
# Directory containing source documents
source = "."

# Directory receiving rendered papers and slides
output = "generated"

# Directory holding the downloaded citation database and snapshot
cache = "data"

[inspect]
# Interpreter for the helper scripts
interpreter = "python3"

# Optional TOC depth classifier; the built-in heading analyzer is used when unset
# classifier = "tools/toc_depth.py"

[resources]
citation_script = "tools/citations.py"
snapshot_url = "https://timsong-cpp.github.io/cppwp/annex-f"

[render]
program = "pandoc"
args = []

[build]
# jobs = 4
fail_fast = false
"#;

const DEFAULT_DEFAULTS: &str = r#"# Rendering options shared by every document in this repository.
# Values here override the engine defaults.
number-sections: true
"#;

const DEFAULT_METADATA: &str = r#"# Document metadata shared by every document in this repository.
# Values here override both defaults layers.
lang: en-US
link-citations: true
"#;

const DEFAULT_PAPER: &str = r#"---
title: An Example Paper
document: P0000R0
date: 2026-01-01
audience:
  - EWG
  - LEWG
author:
  - name: Your Name
    email: you@example.com
---

# Introduction

Describe the problem this paper solves.

# Motivation

## Examples

# Wording

Changes are relative to [@N4950].
"#;

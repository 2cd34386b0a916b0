//! Front matter extraction and parsing.

use serde::Deserialize;

/// Parsed front matter from a source document.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FrontMatter {
    /// Document title
    #[serde(default)]
    pub title: String,

    /// Document number, e.g. `P1234R0`
    #[serde(default)]
    pub document: Option<String>,

    /// Publication date as written (`2024-01-15`, `today`, ...)
    #[serde(default)]
    pub date: Option<String>,

    /// Intended audience
    #[serde(default)]
    pub audience: Option<Audience>,

    /// Authors, in order of appearance
    #[serde(default)]
    pub author: Vec<Author>,

    /// Whether a table of contents is requested
    #[serde(default)]
    pub toc: Option<bool>,
}

/// A document author.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

/// One audience or a list of audiences.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    /// All audiences as a flat list.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(a) => vec![a.clone()],
            Self::Many(list) => list.clone(),
        }
    }
}

/// Extract front matter from a source document.
///
/// Returns the parsed front matter and the remaining content after the block.
pub fn extract_front_matter(source: &str) -> Result<(Option<FrontMatter>, &str), FrontMatterError> {
    let trimmed = source.trim_start();

    if !trimmed.starts_with("---") {
        return Ok((None, source));
    }

    let after_open = &trimmed[3..];
    let Some(close_pos) = after_open.find("\n---") else {
        return Err(FrontMatterError::Unclosed);
    };

    let yaml_content = after_open[..close_pos].trim();
    let remaining = &after_open[close_pos + 4..];

    if yaml_content.is_empty() {
        return Ok((Some(FrontMatter::default()), remaining.trim_start()));
    }

    let front_matter: FrontMatter = serde_yaml::from_str(yaml_content)
        .map_err(|e| FrontMatterError::InvalidYaml(e.to_string()))?;

    Ok((Some(front_matter), remaining.trim_start()))
}

/// Errors that can occur when parsing front matter.
#[derive(Debug, thiserror::Error)]
pub enum FrontMatterError {
    #[error("Unclosed front matter block - missing closing ---")]
    Unclosed,

    #[error("Invalid YAML in front matter: {0}")]
    InvalidYaml(String),
}

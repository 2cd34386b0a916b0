//! Source document parser.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use crate::frontmatter::{extract_front_matter, FrontMatter, FrontMatterError};

/// A parsed source document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Parsed front matter (if present)
    pub front_matter: Option<FrontMatter>,

    /// Prose content (without front matter)
    pub body: String,

    /// Headings in document order
    pub outline: Vec<Heading>,
}

impl Document {
    /// Deepest heading level used anywhere in the body.
    pub fn max_heading_level(&self) -> Option<u8> {
        self.outline.iter().map(|h| h.level).max()
    }

    /// Document title from front matter, if any.
    pub fn title(&self) -> Option<&str> {
        self.front_matter
            .as_ref()
            .map(|fm| fm.title.as_str())
            .filter(|t| !t.is_empty())
    }
}

/// A heading in the document outline.
#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    /// Heading text
    pub title: String,
    /// Anchor ID
    pub id: String,
    /// Heading level (1-6)
    pub level: u8,
}

/// Errors that can occur when parsing a document.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Front matter error: {0}")]
    FrontMatter(#[from] FrontMatterError),
}

/// Parse a source document.
///
/// Extracts front matter and builds the heading outline. Headings inside
/// fenced or indented code blocks never appear in the outline.
pub fn parse_document(source: &str) -> Result<Document, ParseError> {
    let (front_matter, body) = extract_front_matter(source)?;

    Ok(Document {
        front_matter,
        body: body.to_string(),
        outline: outline(body),
    })
}

/// Collect the heading outline of a markdown body.
pub fn outline(body: &str) -> Vec<Heading> {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_HEADING_ATTRIBUTES;

    let mut headings = Vec::new();
    let mut current: Option<(u8, Option<String>, String)> = None; // (level, explicit id, text)

    for event in Parser::new_ext(body, options) {
        match event {
            Event::Start(Tag::Heading { level, id, .. }) => {
                current = Some((level as u8, id.map(|i| i.to_string()), String::new()));
            }

            Event::Text(text) | Event::Code(text) => {
                if let Some((_, _, ref mut title)) = current {
                    title.push_str(&text);
                }
            }

            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, id, title)) = current.take() {
                    let title = title.trim().to_string();
                    let id = id.unwrap_or_else(|| slugify(&title));
                    headings.push(Heading { title, id, level });
                }
            }

            _ => {}
        }
    }

    headings
}

/// Convert a heading to a URL-safe slug.
fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

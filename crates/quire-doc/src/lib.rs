//! Source document model for quire.
//!
//! Parses the YAML front matter block that opens every paper and slide deck,
//! and extracts the heading outline used to size generated tables of contents.

pub mod frontmatter;
pub mod parser;

pub use frontmatter::{Audience, Author, FrontMatter, FrontMatterError};
pub use parser::{outline, parse_document, Document, Heading, ParseError};

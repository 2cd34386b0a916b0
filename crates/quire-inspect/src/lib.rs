//! Content analyzers for quire.
//!
//! An analyzer looks at the text of one source document and derives a
//! rendering option from it, currently the table-of-contents depth. The
//! in-process heading analyzer and the external classifier process are
//! interchangeable behind [`ContentAnalyzer`].

pub mod external;
pub mod headings;
pub mod inspector;
pub mod traits;

pub use external::ExternalClassifier;
pub use headings::HeadingDepthAnalyzer;
pub use inspector::Inspector;
pub use traits::{AnalyzeError, ContentAnalyzer, TocDepth};

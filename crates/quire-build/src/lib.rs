//! Incremental build orchestration for quire.
//!
//! Turns a directory of source documents into rendered papers and slide
//! decks, rebuilding only the targets whose dependencies changed.

pub mod cache;
pub mod compose;
pub mod driver;
pub mod layers;
pub mod render;
pub mod settings;
pub mod staleness;
pub mod targets;

pub use cache::{
    required_resources, CacheEntry, CacheError, FetchError, Fetcher, HttpFetcher, ResourceCache,
    ResourceId, ScriptFetcher,
};
pub use compose::{compose, ComposedOptions, LayerFile};
pub use driver::{BuildDriver, BuildError, BuildReport, Outcome, TargetReport, TargetStatus};
pub use layers::{ConfigLayer, LayerError, LayerOrigin, LayerSet};
pub use render::{EngineRenderer, RenderError, RenderJob, Renderer};
pub use settings::Settings;
pub use staleness::Freshness;
pub use targets::{OutputFormat, RepoShape, Target, TargetError, TargetKind};

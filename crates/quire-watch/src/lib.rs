//! Filesystem watching for quire.
//!
//! Reports changes to source documents and configuration layers so watch
//! mode can rebuild stale targets.

pub mod watcher;

pub use watcher::{Classifier, FileWatcher, WatchError, WatchEvent, DEBOUNCE};

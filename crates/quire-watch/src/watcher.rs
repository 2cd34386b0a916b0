//! File watching for watch mode.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Quiet period after which a burst of filesystem events is delivered.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum WatchEvent {
    /// A source document was created or modified
    SourceChanged(PathBuf),

    /// A configuration layer was created or modified
    LayerChanged(PathBuf),

    /// A source document or layer was deleted
    Removed(PathBuf),

    /// Anything else in a watched directory
    Other(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            Self::SourceChanged(p) | Self::LayerChanged(p) | Self::Removed(p) | Self::Other(p) => p,
        }
    }

    /// Whether the event can change what a build produces.
    pub fn is_relevant(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

/// Errors raised while setting up a watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Failed to create file watcher: {0}")]
    Init(String),

    #[error("Failed to watch {}: {message}", .path.display())]
    Watch { path: PathBuf, message: String },
}

/// Decides what a changed path means for the build.
#[derive(Debug, Clone)]
pub struct Classifier {
    source_dir: PathBuf,
    layers: Vec<PathBuf>,
}

impl Classifier {
    pub fn new(source_dir: &Path, layers: &[PathBuf]) -> Self {
        Self {
            source_dir: normalize(source_dir),
            layers: layers.iter().map(|p| normalize(p)).collect(),
        }
    }

    pub fn classify(&self, path: &Path, kind: &EventKind) -> Option<WatchEvent> {
        let removed = match kind {
            EventKind::Create(_) | EventKind::Modify(_) => false,
            EventKind::Remove(_) => true,
            _ => return None,
        };

        let path = normalize(path);
        let is_layer = self.layers.contains(&path);
        let is_source = path.parent() == Some(self.source_dir.as_path()) && is_markdown(&path);

        Some(match (is_layer, is_source, removed) {
            (false, false, _) => WatchEvent::Other(path),
            (_, _, true) => WatchEvent::Removed(path),
            (true, _, false) => WatchEvent::LayerChanged(path),
            (false, true, false) => WatchEvent::SourceChanged(path),
        })
    }

    /// Directories that must be watched to see every relevant path.
    fn directories(&self) -> BTreeSet<PathBuf> {
        let mut dirs = BTreeSet::new();
        dirs.insert(self.source_dir.clone());
        for layer in &self.layers {
            if let Some(parent) = layer.parent() {
                dirs.insert(parent.to_path_buf());
            }
        }
        dirs
    }
}

/// File watcher for detecting changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch the top level of `source_dir` and the directories holding each
    /// layer file.
    ///
    /// Returns the watcher and a channel to receive events. Events are
    /// coalesced until the filesystem has been quiet for [`DEBOUNCE`].
    pub fn new(
        source_dir: &Path,
        layers: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), WatchError> {
        let classifier = Classifier::new(source_dir, layers);
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(|e| WatchError::Init(e.to_string()))?;

        for dir in classifier.directories() {
            if !dir.is_dir() {
                tracing::debug!("Not watching missing directory {}", dir.display());
                continue;
            }
            watcher
                .watch(&dir, RecursiveMode::NonRecursive)
                .map_err(|e| WatchError::Watch {
                    path: dir.clone(),
                    message: e.to_string(),
                })?;
            tracing::debug!("Watching {}", dir.display());
        }

        std::thread::spawn(move || {
            while let Ok(first) = sync_rx.recv() {
                let mut batch = vec![first];
                loop {
                    match sync_rx.recv_timeout(DEBOUNCE) {
                        Ok(event) => batch.push(event),
                        Err(RecvTimeoutError::Timeout) => break,
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                }

                let mut events = BTreeSet::new();
                for event in &batch {
                    for path in &event.paths {
                        if let Some(e) = classifier.classify(path, &event.kind) {
                            events.insert(e);
                        }
                    }
                }

                for event in events {
                    if async_tx.blocking_send(event).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

fn is_markdown(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("md") | Some("markdown")
    )
}

/// Absolute form of `path` with its directory resolved, so paths reported by
/// the OS compare equal to configured ones. Works for files that do not
/// exist yet.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            match fs::canonicalize(parent) {
                Ok(dir) => dir.join(name),
                Err(_) => path.to_path_buf(),
            }
        }
        _ => path.to_path_buf(),
    }
}

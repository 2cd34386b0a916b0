//! Local cache of externally fetched reference data.
//!
//! Two resources exist: the citation database and the normative-reference
//! snapshot. Once a local copy is present it is used as-is; only
//! [`ResourceCache::refresh`] goes back to the network. Each resource has a
//! single guarded slot, so concurrent [`ResourceCache::ensure`] calls perform
//! at most one fetch and all observe its result.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::targets::TargetKind;

/// User agent sent with HTTP fetches.
const USER_AGENT: &str = concat!("quire/", env!("CARGO_PKG_VERSION"));

/// Suffix of in-progress downloads.
pub(crate) const PARTIAL_SUFFIX: &str = ".part";

/// A cached external resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceId {
    /// Bibliography database consumed by the renderer
    Citations,
    /// Snapshot of the normative reference text
    NormativeSnapshot,
}

impl ResourceId {
    pub const ALL: [ResourceId; 2] = [ResourceId::Citations, ResourceId::NormativeSnapshot];

    /// File name of the local copy inside the cache directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Citations => "citations.yaml",
            Self::NormativeSnapshot => "normative-snapshot.html",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Citations => f.write_str("citations"),
            Self::NormativeSnapshot => f.write_str("normative-snapshot"),
        }
    }
}

/// Resources a target of `kind` depends on.
pub fn required_resources(kind: TargetKind) -> &'static [ResourceId] {
    match kind {
        TargetKind::Paper => &[ResourceId::Citations, ResourceId::NormativeSnapshot],
        TargetKind::Slides => &[ResourceId::Citations],
    }
}

/// Retrieves one resource from its external source.
pub trait Fetcher: Send + Sync {
    /// Human-readable source, for logs.
    fn describe(&self) -> String;

    /// Write the resource to `dest`.
    fn fetch(&self, dest: &Path) -> Result<(), FetchError>;
}

/// Errors that can occur while fetching a resource.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("{url}: HTTP {status}")]
    Status { url: String, status: String },

    #[error("Failed to spawn `{program}`: {message}")]
    Spawn { program: String, message: String },

    #[error("Script exited with {status}: {stderr}")]
    Script { status: String, stderr: String },

    #[error("{0} produced no data")]
    Empty(String),

    #[error("Failed to write {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },
}

/// Downloads a static document over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    pub url: String,
    pub timeout: Duration,
}

impl HttpFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl Fetcher for HttpFetcher {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch(&self, dest: &Path) -> Result<(), FetchError> {
        let http_err = |e: reqwest::Error| FetchError::Http {
            url: self.url.clone(),
            message: e.to_string(),
        };

        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .build()
            .map_err(http_err)?;

        let response = client.get(&self.url).send().map_err(http_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: status.to_string(),
            });
        }

        let body = response.bytes().map_err(http_err)?;
        if body.is_empty() {
            return Err(FetchError::Empty(self.url.clone()));
        }

        fs::write(dest, &body).map_err(|e| FetchError::Write {
            path: dest.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Runs a script whose stdout is the resource.
#[derive(Debug, Clone)]
pub struct ScriptFetcher {
    pub interpreter: PathBuf,
    pub script: PathBuf,
}

impl ScriptFetcher {
    pub fn new(interpreter: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
        }
    }
}

impl Fetcher for ScriptFetcher {
    fn describe(&self) -> String {
        format!("{} {}", self.interpreter.display(), self.script.display())
    }

    fn fetch(&self, dest: &Path) -> Result<(), FetchError> {
        let output = Command::new(&self.interpreter)
            .arg(&self.script)
            .output()
            .map_err(|e| FetchError::Spawn {
                program: self.interpreter.display().to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(FetchError::Script {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(FetchError::Empty(self.describe()));
        }

        fs::write(dest, &output.stdout).map_err(|e| FetchError::Write {
            path: dest.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Snapshot of one cache slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub resource: ResourceId,
    pub local_path: PathBuf,
    /// Whether a local copy is available
    pub fetched: bool,
}

/// Errors that can occur with the resource cache.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("Failed to fetch {resource}: {message}")]
    Fetch { resource: ResourceId, message: String },

    #[error("Cache I/O error at {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

#[derive(Debug)]
enum SlotState {
    Unresolved,
    Ready,
    Failed(String),
}

struct Slot {
    resource: ResourceId,
    local_path: PathBuf,
    fetcher: Box<dyn Fetcher>,
    state: Mutex<SlotState>,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // The state is a plain tag; a panic mid-update leaves nothing half-written.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The resource cache of one build tree.
pub struct ResourceCache {
    dir: PathBuf,
    slots: Vec<Slot>,
}

impl ResourceCache {
    /// Create a cache rooted at `dir` with one fetcher per resource.
    pub fn new(
        dir: impl Into<PathBuf>,
        citations: impl Fetcher + 'static,
        snapshot: impl Fetcher + 'static,
    ) -> Self {
        let dir = dir.into();
        let fetchers: [Box<dyn Fetcher>; 2] = [Box::new(citations), Box::new(snapshot)];

        let slots = ResourceId::ALL
            .into_iter()
            .zip(fetchers)
            .map(|(resource, fetcher)| Slot {
                resource,
                local_path: dir.join(resource.file_name()),
                fetcher,
                state: Mutex::new(SlotState::Unresolved),
            })
            .collect();

        Self { dir, slots }
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot(&self, resource: ResourceId) -> &Slot {
        &self.slots[resource.index()]
    }

    /// Local path of a resource, whether or not it has been fetched.
    pub fn local_path(&self, resource: ResourceId) -> &Path {
        &self.slot(resource).local_path
    }

    /// Current state of a resource.
    pub fn entry(&self, resource: ResourceId) -> CacheEntry {
        let slot = self.slot(resource);
        let state = slot.lock();
        CacheEntry {
            resource,
            local_path: slot.local_path.clone(),
            fetched: matches!(*state, SlotState::Ready) || slot.local_path.is_file(),
        }
    }

    /// Make sure a local copy exists, fetching it if necessary.
    ///
    /// A present copy is returned without network access. Concurrent callers
    /// for the same resource wait for a single fetch and share its outcome,
    /// including a failure, until the next [`ResourceCache::refresh`].
    pub fn ensure(&self, resource: ResourceId) -> Result<PathBuf, CacheError> {
        let slot = self.slot(resource);
        let mut state = slot.lock();

        match &*state {
            SlotState::Ready => return Ok(slot.local_path.clone()),
            SlotState::Failed(message) => {
                return Err(CacheError::Fetch {
                    resource,
                    message: message.clone(),
                })
            }
            SlotState::Unresolved => {}
        }

        if slot.local_path.is_file() {
            *state = SlotState::Ready;
            return Ok(slot.local_path.clone());
        }

        match self.fetch(slot) {
            Ok(()) => {
                *state = SlotState::Ready;
                Ok(slot.local_path.clone())
            }
            Err(e) => {
                let message = match &e {
                    CacheError::Fetch { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                *state = SlotState::Failed(message);
                Err(e)
            }
        }
    }

    /// Fetch a resource again, replacing the local copy.
    ///
    /// A failed refresh leaves any previous copy untouched.
    pub fn refresh(&self, resource: ResourceId) -> Result<PathBuf, CacheError> {
        let slot = self.slot(resource);
        let mut state = slot.lock();

        match self.fetch(slot) {
            Ok(()) => {
                *state = SlotState::Ready;
                Ok(slot.local_path.clone())
            }
            Err(e) => {
                *state = SlotState::Unresolved;
                Err(e)
            }
        }
    }

    /// Delete every local copy. Returns the paths that were removed.
    pub fn remove_all(&self) -> Result<Vec<PathBuf>, CacheError> {
        let mut removed = Vec::new();

        for slot in &self.slots {
            let mut state = slot.lock();
            if slot.local_path.is_file() {
                fs::remove_file(&slot.local_path).map_err(|e| CacheError::Io {
                    path: slot.local_path.clone(),
                    message: e.to_string(),
                })?;
                removed.push(slot.local_path.clone());
            }
            *state = SlotState::Unresolved;
        }

        Ok(removed)
    }

    /// Run the slot's fetcher into a partial file, then move it into place.
    fn fetch(&self, slot: &Slot) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.clone(),
            message: e.to_string(),
        })?;

        let partial = partial_path(&slot.local_path);

        tracing::info!("Fetching {} from {}", slot.resource, slot.fetcher.describe());

        if let Err(e) = slot.fetcher.fetch(&partial) {
            let _ = fs::remove_file(&partial);
            return Err(CacheError::Fetch {
                resource: slot.resource,
                message: e.to_string(),
            });
        }

        fs::rename(&partial, &slot.local_path).map_err(|e| CacheError::Io {
            path: slot.local_path.clone(),
            message: e.to_string(),
        })?;

        tracing::info!("Cached {} at {}", slot.resource, slot.local_path.display());
        Ok(())
    }
}

impl fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use tempfile::tempdir;

    /// Writes fixed content and counts invocations.
    #[derive(Clone, Default)]
    struct Counting {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Fetcher for Counting {
        fn describe(&self) -> String {
            "counting".to_string()
        }

        fn fetch(&self, dest: &Path) -> Result<(), FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            if self.fail {
                return Err(FetchError::Empty("counting".to_string()));
            }
            fs::write(dest, "references: []\n").map_err(|e| FetchError::Write {
                path: dest.to_path_buf(),
                message: e.to_string(),
            })
        }
    }

    fn cache_with(dir: &Path, citations: Counting) -> ResourceCache {
        ResourceCache::new(dir, citations, Counting::default())
    }

    #[test]
    fn ensure_fetches_once_then_uses_local_copy() {
        let temp = tempdir().unwrap();
        let fetcher = Counting::default();
        let cache = cache_with(temp.path(), fetcher.clone());

        let first = cache.ensure(ResourceId::Citations).unwrap();
        let second = cache.ensure(ResourceId::Citations).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, temp.path().join("citations.yaml"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(!partial_path(&first).exists());
    }

    #[test]
    fn existing_copy_is_never_refetched() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("citations.yaml"), "old").unwrap();
        let fetcher = Counting::default();
        let cache = cache_with(temp.path(), fetcher.clone());

        cache.ensure(ResourceId::Citations).unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(cache.entry(ResourceId::Citations).fetched);
    }

    #[test]
    fn concurrent_ensure_fetches_exactly_once() {
        let temp = tempdir().unwrap();
        let fetcher = Counting::default();
        let cache = Arc::new(cache_with(temp.path(), fetcher.clone()));
        let workers = 8;
        let barrier = Arc::new(Barrier::new(workers));

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    cache.ensure(ResourceId::Citations)
                })
            })
            .collect();

        let paths: Vec<PathBuf> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(paths.len(), workers);
        assert!(paths.iter().all(|p| p == &paths[0]));
    }

    #[test]
    fn failed_fetch_is_shared_until_refresh() {
        let temp = tempdir().unwrap();
        let fetcher = Counting {
            fail: true,
            ..Default::default()
        };
        let cache = cache_with(temp.path(), fetcher.clone());

        assert!(matches!(
            cache.ensure(ResourceId::Citations),
            Err(CacheError::Fetch { .. })
        ));
        assert!(cache.ensure(ResourceId::Citations).is_err());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(!cache.entry(ResourceId::Citations).fetched);
        assert!(!partial_path(cache.local_path(ResourceId::Citations)).exists());

        assert!(cache.refresh(ResourceId::Citations).is_err());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn refresh_overwrites_existing_copy() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("citations.yaml");
        fs::write(&path, "stale").unwrap();
        let fetcher = Counting::default();
        let cache = cache_with(temp.path(), fetcher.clone());

        cache.refresh(ResourceId::Citations).unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "references: []\n");
    }

    #[test]
    fn failed_refresh_keeps_previous_copy() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("citations.yaml");
        fs::write(&path, "previous").unwrap();
        let cache = cache_with(
            temp.path(),
            Counting {
                fail: true,
                ..Default::default()
            },
        );

        assert!(cache.refresh(ResourceId::Citations).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "previous");
        assert!(cache.ensure(ResourceId::Citations).is_ok());
    }

    #[test]
    fn remove_all_deletes_local_copies() {
        let temp = tempdir().unwrap();
        let cache = cache_with(temp.path(), Counting::default());
        cache.ensure(ResourceId::Citations).unwrap();
        cache.ensure(ResourceId::NormativeSnapshot).unwrap();

        let removed = cache.remove_all().unwrap();

        assert_eq!(removed.len(), 2);
        assert!(!cache.entry(ResourceId::Citations).fetched);
    }

    #[test]
    fn slides_need_only_citations() {
        assert_eq!(required_resources(TargetKind::Slides), &[ResourceId::Citations]);
        assert_eq!(required_resources(TargetKind::Paper).len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn script_fetcher_captures_stdout() {
        let temp = tempdir().unwrap();
        let script = temp.path().join("refs.sh");
        fs::write(&script, "echo 'references:'\necho '  - id: N4861'\n").unwrap();
        let dest = temp.path().join("out.yaml");

        ScriptFetcher::new("sh", &script).fetch(&dest).unwrap();

        assert_eq!(
            fs::read_to_string(&dest).unwrap(),
            "references:\n  - id: N4861\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn script_fetcher_reports_failure() {
        let temp = tempdir().unwrap();
        let script = temp.path().join("refs.sh");
        fs::write(&script, "echo 'offline' >&2\nexit 1\n").unwrap();

        let result = ScriptFetcher::new("sh", &script).fetch(&temp.path().join("out.yaml"));

        match result {
            Err(FetchError::Script { stderr, .. }) => assert_eq!(stderr, "offline"),
            other => panic!("expected script failure, got {:?}", other),
        }
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("data/citations.yaml")),
            PathBuf::from("data/citations.yaml.part")
        );
    }
}

//! Render cache.
//!
//! Rendered pages are kept in a process-wide map keyed by document identity.
//! Each entry carries an invalidation policy:
//!
//! - [`CachePolicy::FileSet`]: the entry is dropped as soon as any file it
//!   depends on changes. Changes are detected by comparing a fingerprint
//!   (modification time and length) on lookup, and by explicit
//!   [`RenderCache::invalidate_path`] calls from a file watcher.
//! - [`CachePolicy::None`]: the entry stays until it is overwritten or
//!   invalidated by key. Used for remote documents, which no local file tracks.

use std::collections::HashMap;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use crate::error::PageError;

/// Suffix appended to a document identity to form its cache key.
pub const HTML_SUFFIX: &str = "_HTML";

/// Cache key of the rendered HTML for `identity`.
pub fn cache_key(identity: &str) -> String {
    format!("{identity}{HTML_SUFFIX}")
}

/// How a cache entry is invalidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachePolicy {
    /// Never invalidated automatically
    None,
    /// Invalidated when any of these files changes or disappears
    FileSet(Vec<PathBuf>),
}

/// Result of rendering a page.
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Final HTML
    pub html: String,
    /// Files read while rendering, each fingerprinted before it was read
    pub dependencies: Vec<Dependency>,
}

/// Something the cache can render on a miss.
pub trait Renderable {
    /// Document identity the cache key is derived from.
    fn identity(&self) -> String;

    /// Whether the content was fetched remotely.
    fn is_remote(&self) -> bool;

    /// Whether caching is enabled for this document.
    fn caching_enabled(&self) -> bool;

    /// Render the final HTML.
    ///
    /// A disk document must list its own file among the dependencies, or its
    /// cache entry never goes stale.
    fn render(&self) -> Result<Rendered, PageError>;
}

/// State of a file at a point in time: modification time and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

impl Fingerprint {
    /// Current fingerprint of `path`, or `None` if it cannot be read.
    pub fn of(path: &Path) -> Option<Self> {
        fs::metadata(path).ok().map(|meta| Self::from_metadata(&meta))
    }

    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        }
    }
}

/// A file a page was built from, with its state before it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub path: PathBuf,
    pub fingerprint: Option<Fingerprint>,
}

impl Dependency {
    /// Record the current state of `path`. Must be called before the file is read.
    pub fn capture(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let fingerprint = Fingerprint::of(&path);
        Self { path, fingerprint }
    }

    fn is_unchanged(&self) -> bool {
        Fingerprint::of(&self.path) == self.fingerprint
    }
}

#[derive(Debug)]
struct CacheEntry {
    html: String,
    /// Watched files; empty for `CachePolicy::None`
    watched: Vec<Dependency>,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.watched.iter().all(Dependency::is_unchanged)
    }

    fn depends_on(&self, path: &Path) -> bool {
        self.watched.iter().any(|dependency| dependency.path == path)
    }
}

/// Process-wide cache of rendered pages.
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`. Stale file-set entries are evicted and reported as a miss.
    pub fn get(&self, key: &str) -> Option<String> {
        {
            let entries = self.entries.read().ok()?;
            let entry = entries.get(key)?;
            if entry.is_fresh() {
                return Some(entry.html.clone());
            }
        }

        tracing::debug!("Cache entry {} is stale", key);
        self.invalidate(key);
        None
    }

    /// Store `html` under `key`, replacing any previous entry.
    pub fn put(&self, key: &str, html: String, policy: CachePolicy) {
        let watched = match policy {
            CachePolicy::None => Vec::new(),
            CachePolicy::FileSet(paths) => paths.into_iter().map(Dependency::capture).collect(),
        };
        self.insert(key, CacheEntry { html, watched });
    }

    fn insert(&self, key: &str, entry: CacheEntry) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(key.to_string(), entry);
            }
            Err(_) => tracing::warn!("Render cache lock poisoned, not storing {}", key),
        }
    }

    /// Remove the entry for `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries
            .write()
            .map(|mut entries| entries.remove(key).is_some())
            .unwrap_or(false)
    }

    /// Remove every file-set entry that depends on `path`. Returns how many were removed.
    pub fn invalidate_path(&self, path: &Path) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, entry| !entry.depends_on(path));
        before - entries.len()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached HTML for `doc`, rendering and storing it on a miss.
    ///
    /// Remote documents are stored without file dependencies. Render failures
    /// are returned and nothing is stored.
    pub fn get_or_render(&self, doc: &impl Renderable) -> Result<String, PageError> {
        if !doc.caching_enabled() {
            return Ok(doc.render()?.html);
        }

        let identity = doc.identity();
        let key = cache_key(&identity);

        if let Some(html) = self.get(&key) {
            tracing::debug!("Cache hit: {}", key);
            return Ok(html);
        }
        tracing::debug!("Cache miss: {}", key);

        if doc.is_remote() {
            let rendered = doc.render()?;
            self.put(&key, rendered.html.clone(), CachePolicy::None);
            return Ok(rendered.html);
        }

        let rendered = doc.render()?;

        let mut watched: Vec<Dependency> = Vec::with_capacity(rendered.dependencies.len());
        for dependency in rendered.dependencies {
            if !watched.iter().any(|d| d.path == dependency.path) {
                watched.push(dependency);
            }
        }

        self.insert(
            &key,
            CacheEntry {
                html: rendered.html.clone(),
                watched,
            },
        );
        Ok(rendered.html)
    }
}

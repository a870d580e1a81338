//! Content sources.
//!
//! A document's text comes either from a file under the document root or,
//! when no such file exists and the request asks for it, from a remote
//! content-management site. Both present the same interface downstream.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ureq::Agent;

use crate::cache::{Dependency, Fingerprint};
use crate::error::PageError;

/// File extensions served through the document pipeline.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown", "mdh"];

/// Default HTTP timeout for remote fetches, in seconds.
const DEFAULT_TIMEOUT: u64 = 30;

/// Check whether a request path names a document.
pub fn is_document_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            DOCUMENT_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Scheme, host and port of the site a request was addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteIdentity {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl SiteIdentity {
    /// Build an identity from a scheme and an `authority` (`host` or `host:port`).
    pub fn new(scheme: &str, authority: &str) -> Self {
        let scheme = scheme.to_lowercase();
        let default_port = if scheme == "https" { 443 } else { 80 };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && !authority.ends_with(']') => {
                match port.parse() {
                    Ok(port) => (host, port),
                    Err(_) => (authority, default_port),
                }
            }
            _ => (authority, default_port),
        };

        Self {
            scheme,
            host: host.to_string(),
            port,
        }
    }

    /// Parse the site part of an absolute URL such as `https://example.com:8443/a/b.md`.
    pub fn from_url(url: &str) -> Option<Self> {
        let (scheme, rest) = url.split_once("://")?;
        let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
        if scheme.is_empty() || authority.is_empty() {
            return None;
        }
        Some(Self::new(scheme, authority))
    }
}

impl fmt::Display for SiteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Inbound request for a document.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    /// URL path of the document (e.g. `/guide/intro.md`)
    pub path: String,

    /// Site the request was addressed to, when known
    pub site: Option<SiteIdentity>,

    /// Whether the remote content fallback may be tried
    pub remote_fallback: bool,

    /// Whether the raw source was requested instead of HTML
    pub download: bool,
}

impl PageRequest {
    /// Request for a local document.
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Request that may fall back to the remote source of `site`.
    pub fn remote(path: impl Into<String>, site: SiteIdentity) -> Self {
        Self {
            path: path.into(),
            site: Some(site),
            remote_fallback: true,
            download: false,
        }
    }

    /// Ask for the raw source.
    pub fn with_download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }
}

/// Where a document's text comes from.
#[derive(Debug, Clone)]
pub enum ContentSource {
    /// A file under the document root, with its state when it was resolved
    Disk {
        path: PathBuf,
        fingerprint: Fingerprint,
    },

    /// Text fetched from a remote site
    Remote {
        site: SiteIdentity,
        logical_path: String,
        text: String,
    },
}

impl ContentSource {
    /// Identity used for cache keys and dependency tracking.
    pub fn identity(&self) -> String {
        match self {
            Self::Disk { path, .. } => path.display().to_string(),
            Self::Remote {
                site, logical_path, ..
            } => format!("{site}{logical_path}"),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// The file behind a disk source, as it was before any of it was read.
    pub fn dependency(&self) -> Option<Dependency> {
        match self {
            Self::Disk { path, fingerprint } => Some(Dependency {
                path: path.clone(),
                fingerprint: Some(*fingerprint),
            }),
            Self::Remote { .. } => None,
        }
    }

    /// Name of the underlying file, including its extension.
    pub fn file_name(&self) -> String {
        let path = match self {
            Self::Disk { path, .. } => path.as_path(),
            Self::Remote { logical_path, .. } => Path::new(logical_path.as_str()),
        };
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Read the full text, including any front matter.
    pub fn read_text(&self) -> Result<String, PageError> {
        match self {
            Self::Disk { path, .. } => fs::read_to_string(path).map_err(|e| PageError::from_io(path, e)),
            Self::Remote { text, .. } => Ok(text.clone()),
        }
    }
}

/// Errors from a remote content source.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("HTTP error: {status}")]
    Status { status: u16 },

    #[error("Remote returned no content")]
    Empty,
}

/// Fetches document text from a remote content-management site.
pub trait RemoteContentSource: Send + Sync {
    fn fetch(&self, site: &SiteIdentity, logical_path: &str) -> Result<String, RemoteError>;
}

/// [`RemoteContentSource`] that GETs `{site}{prefix}{path}` over HTTP.
pub struct HttpRemoteSource {
    agent: Agent,
    prefix: String,
}

impl HttpRemoteSource {
    pub fn new(prefix: &str) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT)))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, site: &SiteIdentity, logical_path: &str) -> String {
        format!("{site}{}/{}", self.prefix, logical_path.trim_start_matches('/'))
    }
}

impl RemoteContentSource for HttpRemoteSource {
    fn fetch(&self, site: &SiteIdentity, logical_path: &str) -> Result<String, RemoteError> {
        let url = self.url(site, logical_path);
        tracing::debug!("Fetching remote content from {}", url);

        let response = self
            .agent
            .get(&url)
            .header("Accept", "text/markdown, text/plain")
            .call()
            .map_err(|e| RemoteError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(RemoteError::Status { status });
        }

        let mut body = response.into_body();
        let text = body
            .read_to_string()
            .map_err(|e| RemoteError::Request(e.to_string()))?;
        if text.is_empty() {
            return Err(RemoteError::Empty);
        }
        Ok(text)
    }
}

/// Decides where a requested document's text comes from.
#[derive(Clone)]
pub struct ContentResolver {
    root: PathBuf,
    remote: Option<Arc<dyn RemoteContentSource>>,
    remote_sites: Vec<SiteIdentity>,
}

impl ContentResolver {
    /// Create a resolver for documents under `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.canonicalize().unwrap_or_else(|_| root.to_path_buf()),
            remote: None,
            remote_sites: Vec::new(),
        }
    }

    /// Enable the remote fallback.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteContentSource>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Sites the remote fallback may fetch from. Requests addressed to any
    /// other site never leave the server.
    pub fn with_remote_sites(mut self, sites: Vec<SiteIdentity>) -> Self {
        self.remote_sites = sites;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a URL path to a file under the root.
    ///
    /// Paths that would escape the root are forbidden.
    pub fn physical_path(&self, logical_path: &str) -> Result<PathBuf, PageError> {
        let mut path = self.root.clone();
        for part in Path::new(logical_path.trim_start_matches('/')).components() {
            match part {
                Component::Normal(name) => path.push(name),
                Component::CurDir | Component::RootDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(PageError::Forbidden(logical_path.to_string()));
                }
            }
        }
        Ok(path)
    }

    /// Resolve the source for `request`.
    pub fn resolve(&self, request: &PageRequest) -> Result<ContentSource, PageError> {
        let path = self.physical_path(&request.path)?;

        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {
                return Ok(ContentSource::Disk {
                    fingerprint: Fingerprint::from_metadata(&meta),
                    path,
                });
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(PageError::Forbidden(request.path.clone()));
            }
            Err(_) => {}
        }

        if !request.remote_fallback {
            return Err(PageError::NotFound(request.path.clone()));
        }

        let (Some(remote), Some(site)) = (&self.remote, &request.site) else {
            return Err(PageError::NotFound(request.path.clone()));
        };

        if !self.remote_sites.contains(site) {
            tracing::warn!("Refusing remote fetch of {} from unlisted site {}", request.path, site);
            return Err(PageError::NotFound(request.path.clone()));
        }

        match remote.fetch(site, &request.path) {
            Ok(text) => Ok(ContentSource::Remote {
                site: site.clone(),
                logical_path: request.path.clone(),
                text,
            }),
            Err(e) => {
                tracing::warn!("Remote fetch of {} from {} failed: {}", request.path, site, e);
                Err(PageError::NotFound(request.path.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct FakeRemote {
        text: Option<String>,
        calls: AtomicUsize,
    }

    impl RemoteContentSource for FakeRemote {
        fn fetch(&self, _site: &SiteIdentity, _path: &str) -> Result<String, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.text.clone().ok_or(RemoteError::Status { status: 404 })
        }
    }

    fn site() -> SiteIdentity {
        SiteIdentity::new("http", "cms.local:8080")
    }

    #[test]
    fn parses_site_identity() {
        assert_eq!(
            SiteIdentity::from_url("https://example.com/a/b.md").unwrap().to_string(),
            "https://example.com:443"
        );
        assert_eq!(
            SiteIdentity::from_url("http://example.com:8080/a.md?x=1").unwrap().to_string(),
            "http://example.com:8080"
        );
        assert_eq!(SiteIdentity::new("http", "[::1]").host, "[::1]");
        assert_eq!(SiteIdentity::new("http", "[::1]:9000").port, 9000);
        assert!(SiteIdentity::from_url("not a url").is_none());
    }

    #[test]
    fn recognizes_document_paths() {
        assert!(is_document_path("/a/b.md"));
        assert!(is_document_path("/a/b.MDH"));
        assert!(!is_document_path("/a/b.css"));
        assert!(!is_document_path("/a/"));
    }

    #[test]
    fn resolves_disk_file() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("page.md"), "# Page").unwrap();
        let resolver = ContentResolver::new(temp.path());

        let source = resolver.resolve(&PageRequest::local("/page.md")).unwrap();

        assert!(!source.is_remote());
        assert_eq!(source.file_name(), "page.md");
        assert_eq!(source.read_text().unwrap(), "# Page");
    }

    #[test]
    fn missing_file_without_marker_is_not_found() {
        let temp = tempdir().unwrap();
        let remote = Arc::new(FakeRemote {
            text: Some("remote".to_string()),
            calls: AtomicUsize::new(0),
        });
        let resolver = ContentResolver::new(temp.path())
            .with_remote(remote.clone())
            .with_remote_sites(vec![site()]);

        let result = resolver.resolve(&PageRequest::local("/missing.md"));

        assert!(matches!(result, Err(PageError::NotFound(_))));
        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn falls_back_to_remote_with_marker() {
        let temp = tempdir().unwrap();
        let remote = Arc::new(FakeRemote {
            text: Some("---\ntitle: Remote\n---\nBody".to_string()),
            calls: AtomicUsize::new(0),
        });
        let resolver = ContentResolver::new(temp.path())
            .with_remote(remote)
            .with_remote_sites(vec![site()]);

        let source = resolver
            .resolve(&PageRequest::remote("/docs/remote.md", site()))
            .unwrap();

        assert!(source.is_remote());
        assert_eq!(source.identity(), "http://cms.local:8080/docs/remote.md");
        assert_eq!(source.file_name(), "remote.md");
    }

    #[test]
    fn unlisted_sites_are_never_fetched() {
        let temp = tempdir().unwrap();
        let remote = Arc::new(FakeRemote {
            text: Some("internal".to_string()),
            calls: AtomicUsize::new(0),
        });
        let resolver = ContentResolver::new(temp.path())
            .with_remote(remote.clone())
            .with_remote_sites(vec![site()]);

        for authority in ["169.254.169.254", "internal-db:5984", "cms.local"] {
            let request = PageRequest::remote("/x.md", SiteIdentity::new("http", authority));
            let result = resolver.resolve(&request);
            assert!(matches!(result, Err(PageError::NotFound(_))), "{authority}");
        }
        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn no_listed_sites_disables_remote() {
        let temp = tempdir().unwrap();
        let remote = Arc::new(FakeRemote {
            text: Some("remote".to_string()),
            calls: AtomicUsize::new(0),
        });
        let resolver = ContentResolver::new(temp.path()).with_remote(remote.clone());

        let result = resolver.resolve(&PageRequest::remote("/docs/remote.md", site()));

        assert!(matches!(result, Err(PageError::NotFound(_))));
        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn disk_source_records_file_state() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("page.md");
        std::fs::write(&path, "# Page").unwrap();
        let resolver = ContentResolver::new(temp.path());

        let source = resolver.resolve(&PageRequest::local("/page.md")).unwrap();
        let dependency = source.dependency().unwrap();

        assert_eq!(dependency.path, resolver.root().join("page.md"));
        assert_eq!(dependency.fingerprint, Fingerprint::of(&path));
    }

    #[test]
    fn failed_remote_fetch_is_not_found() {
        let temp = tempdir().unwrap();
        let remote = Arc::new(FakeRemote {
            text: None,
            calls: AtomicUsize::new(0),
        });
        let resolver = ContentResolver::new(temp.path())
            .with_remote(remote.clone())
            .with_remote_sites(vec![site()]);

        let result = resolver.resolve(&PageRequest::remote("/gone.md", site()));

        assert!(matches!(result, Err(PageError::NotFound(_))));
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn local_file_wins_over_remote() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("both.md"), "local").unwrap();
        let remote = Arc::new(FakeRemote {
            text: Some("remote".to_string()),
            calls: AtomicUsize::new(0),
        });
        let resolver = ContentResolver::new(temp.path())
            .with_remote(remote.clone())
            .with_remote_sites(vec![site()]);

        let source = resolver
            .resolve(&PageRequest::remote("/both.md", site()))
            .unwrap();

        assert!(!source.is_remote());
        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rejects_parent_traversal() {
        let temp = tempdir().unwrap();
        let resolver = ContentResolver::new(temp.path());

        let result = resolver.resolve(&PageRequest::local("/../etc/passwd.md"));

        assert!(matches!(result, Err(PageError::Forbidden(_))));
    }

    #[test]
    fn builds_remote_url_from_prefix() {
        let source = HttpRemoteSource::new("/_content/");

        assert_eq!(
            source.url(&site(), "/docs/a.md"),
            "http://cms.local:8080/_content/docs/a.md"
        );
    }
}

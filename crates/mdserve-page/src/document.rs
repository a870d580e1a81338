//! Documents and the site that serves them.
//!
//! A [`Document`] lives for a single request. Every derived attribute (content,
//! front matter, HTML, title) is computed on first access and memoized.

use std::cell::{OnceCell, RefCell};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local};

use mdserve_mdx::{
    extract_front_matter, is_literal_html, resolve_title, rewrite_virtual_paths,
    CmarkRenderer, FrontMatter, MarkdownRenderer, RenderOptions,
};

use crate::cache::{Dependency, RenderCache, Renderable, Rendered};
use crate::config::{
    ConfigProvider, SiteConfig, ALLOW_DOWNLOADING, TEMPLATE_NAME, USE_CACHING, USE_EMOJI,
};
use crate::error::PageError;
use crate::layout::{LayoutContext, LayoutEngine, LayoutError};
use crate::source::{
    ContentResolver, ContentSource, HttpRemoteSource, PageRequest, RemoteContentSource,
};

/// Content type of rendered pages.
pub const HTML_CONTENT_TYPE: &str = "text/html";
/// Content type of downloaded sources.
pub const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=UTF-8";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Raw source offered as a file download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: String,
}

/// What to send back for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageResponse {
    Html(String),
    Download(Download),
}

/// Services shared by every request: configuration, sources, renderer, layout and cache.
pub struct Site {
    config: Arc<dyn ConfigProvider>,
    base_url: String,
    resolver: ContentResolver,
    renderer: Arc<dyn MarkdownRenderer>,
    layout: LayoutEngine,
    cache: Arc<RenderCache>,
}

impl Site {
    /// Build a site from configuration with the default renderer and an HTTP remote source.
    pub fn new(config: SiteConfig) -> Self {
        let resolver = ContentResolver::new(&config.root)
            .with_remote(Arc::new(HttpRemoteSource::new(&config.remote_prefix)))
            .with_remote_sites(config.remote_sites.clone());
        let layout = LayoutEngine::new(resolver.root());

        Self {
            base_url: config.base_url.clone(),
            config: Arc::new(config),
            resolver,
            renderer: Arc::new(CmarkRenderer::new()),
            layout,
            cache: Arc::new(RenderCache::new()),
        }
    }

    /// Replace the configuration provider.
    pub fn with_config_provider(mut self, config: Arc<dyn ConfigProvider>) -> Self {
        self.config = config;
        self
    }

    /// Replace the Markdown renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn MarkdownRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replace the remote content source.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteContentSource>) -> Self {
        self.resolver = self.resolver.with_remote(remote);
        self
    }

    /// Share an existing cache.
    pub fn with_cache(mut self, cache: Arc<RenderCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    pub fn cache(&self) -> &Arc<RenderCache> {
        &self.cache
    }

    /// Whether `url_path` must not be served as a static file: hidden and
    /// underscore-prefixed segments (`.git`, `_partials`) and the site layout.
    pub fn is_private_path(&self, url_path: &str) -> bool {
        let segments: Vec<&str> = url_path.split('/').filter(|s| !s.is_empty()).collect();
        if segments
            .iter()
            .any(|s| s.starts_with('.') || s.starts_with('_'))
        {
            return true;
        }

        let layout = self.config.value_or(TEMPLATE_NAME, None, "");
        let layout: Vec<&str> = layout.split('/').filter(|s| !s.is_empty()).collect();
        !layout.is_empty() && layout == segments
    }

    /// Resolve the content source for `request` and open the document.
    pub fn open(&self, request: &PageRequest) -> Result<Document<'_>, PageError> {
        let source = self.resolver.resolve(request)?;
        Ok(Document::new(self, source))
    }

    /// Produce the response for `request`: rendered HTML or, if asked for, the raw source.
    pub fn respond(&self, request: &PageRequest) -> Result<PageResponse, PageError> {
        let doc = self.open(request)?;
        if request.download {
            doc.download().map(PageResponse::Download)
        } else {
            doc.html().map(|html| PageResponse::Html(html.to_string()))
        }
    }
}

/// Front matter and content, split once.
#[derive(Debug)]
struct Loaded {
    front_matter: FrontMatter,
    content: String,
}

/// File timestamps, read once.
#[derive(Debug, Clone, Copy, Default)]
struct FileTimes {
    created: Option<DateTime<Local>>,
    modified: Option<DateTime<Local>>,
}

/// One renderable document.
pub struct Document<'a> {
    site: &'a Site,
    source: ContentSource,
    file_name: String,
    loaded: OnceCell<Loaded>,
    raw_html: OnceCell<String>,
    html: OnceCell<String>,
    title: OnceCell<String>,
    times: OnceCell<FileTimes>,
    layout_dependencies: RefCell<Vec<Dependency>>,
}

impl<'a> Document<'a> {
    fn new(site: &'a Site, source: ContentSource) -> Self {
        Self {
            site,
            file_name: source.file_name(),
            source,
            loaded: OnceCell::new(),
            raw_html: OnceCell::new(),
            html: OnceCell::new(),
            title: OnceCell::new(),
            times: OnceCell::new(),
            layout_dependencies: RefCell::new(Vec::new()),
        }
    }

    /// Cache identity: the file path, or site and path for remote documents.
    pub fn identity(&self) -> String {
        self.source.identity()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Extension including the dot, or an empty string.
    pub fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default()
    }

    pub fn is_literal_html(&self) -> bool {
        is_literal_html(&self.file_name)
    }

    pub fn is_remote(&self) -> bool {
        self.source.is_remote()
    }

    pub fn source(&self) -> &ContentSource {
        &self.source
    }

    fn loaded(&self) -> Result<&Loaded, PageError> {
        if let Some(loaded) = self.loaded.get() {
            return Ok(loaded);
        }

        let text = self.source.read_text()?;
        let (front_matter, content) = extract_front_matter(&text);
        let loaded = Loaded {
            content: content.to_string(),
            front_matter,
        };
        Ok(self.loaded.get_or_init(|| loaded))
    }

    /// Text with the front matter removed.
    pub fn content(&self) -> Result<&str, PageError> {
        Ok(&self.loaded()?.content)
    }

    pub fn front_matter(&self) -> Result<&FrontMatter, PageError> {
        Ok(&self.loaded()?.front_matter)
    }

    /// Setting value, with this document's front matter taking precedence.
    pub fn setting(&self, name: &str, default: &str) -> String {
        self.site
            .config
            .value_or(name, self.front_matter().ok(), default)
    }

    /// Title from front matter, first heading, or file name.
    pub fn title(&self) -> Result<&str, PageError> {
        if let Some(title) = self.title.get() {
            return Ok(title);
        }
        let loaded = self.loaded()?;
        let title = resolve_title(&loaded.front_matter, &loaded.content, &self.file_name);
        Ok(self.title.get_or_init(|| title))
    }

    /// HTML of the content before layout composition.
    pub fn raw_html(&self) -> Result<&str, PageError> {
        if let Some(html) = self.raw_html.get() {
            return Ok(html);
        }

        let content = self.content()?;
        let html = if self.is_literal_html() {
            content.to_string()
        } else {
            let options = RenderOptions {
                emoji: self.setting(USE_EMOJI, "1") != "0",
            };
            self.site
                .renderer
                .render(content, &options)
                .map_err(|source| PageError::Render {
                    path: self.identity(),
                    source,
                })?
        };

        let html = rewrite_virtual_paths(&html, &self.site.base_url);
        Ok(self.raw_html.get_or_init(|| html))
    }

    /// Final HTML, served from the render cache when possible.
    pub fn html(&self) -> Result<&str, PageError> {
        if let Some(html) = self.html.get() {
            return Ok(html);
        }
        let html = self.site.cache.get_or_render(self)?;
        Ok(self.html.get_or_init(|| html))
    }

    /// Identities whose change invalidates the cached HTML.
    pub fn dependencies(&self) -> Vec<String> {
        std::iter::once(self.identity())
            .chain(
                self.layout_dependencies
                    .borrow()
                    .iter()
                    .map(|d| d.path.display().to_string()),
            )
            .collect()
    }

    fn times(&self) -> FileTimes {
        *self.times.get_or_init(|| match &self.source {
            ContentSource::Disk { path, .. } => read_times(path),
            ContentSource::Remote { .. } => FileTimes::default(),
        })
    }

    /// Creation time of the file; `None` for remote documents.
    pub fn date_created(&self) -> Option<DateTime<Local>> {
        self.times().created
    }

    /// Last modification time of the file; `None` for remote documents.
    pub fn date_modified(&self) -> Option<DateTime<Local>> {
        self.times().modified
    }

    /// Raw source as a download, if the site allows it.
    pub fn download(&self) -> Result<Download, PageError> {
        if self.site.config.value_or(ALLOW_DOWNLOADING, None, "0") != "1" {
            return Err(PageError::Forbidden(format!(
                "download of {} is not allowed",
                self.file_name
            )));
        }

        Ok(Download {
            file_name: self.file_name.clone(),
            content_type: MARKDOWN_CONTENT_TYPE,
            body: self.content()?.to_string(),
        })
    }

    /// Wrap the raw HTML in the configured layout, if any.
    fn compose(&self) -> Result<String, PageError> {
        let raw_html = self.raw_html()?;
        let template = self.setting(TEMPLATE_NAME, "");
        if template.is_empty() {
            return Ok(raw_html.to_string());
        }

        let ctx = LayoutContext {
            title: self.title()?,
            content: raw_html,
            file_name: &self.file_name,
            date_created: self.date_created().map(|d| d.format(DATE_FORMAT).to_string()),
            date_modified: self.date_modified().map(|d| d.format(DATE_FORMAT).to_string()),
            base_url: &self.site.base_url,
            front_matter: self.front_matter()?,
        };

        let composed = self
            .site
            .layout
            .compose(&template, &ctx)
            .map_err(|e: LayoutError| PageError::Layout {
                path: self.identity(),
                message: e.to_string(),
            })?;

        self.layout_dependencies
            .borrow_mut()
            .extend(composed.dependencies);
        Ok(composed.html)
    }
}

impl Renderable for Document<'_> {
    fn identity(&self) -> String {
        self.source.identity()
    }

    fn is_remote(&self) -> bool {
        self.source.is_remote()
    }

    fn caching_enabled(&self) -> bool {
        self.setting(USE_CACHING, "1") == "1"
    }

    fn render(&self) -> Result<Rendered, PageError> {
        self.layout_dependencies.borrow_mut().clear();
        let html = self.compose()?;

        let mut dependencies: Vec<Dependency> = self.source.dependency().into_iter().collect();
        dependencies.extend(self.layout_dependencies.borrow().iter().cloned());
        Ok(Rendered { html, dependencies })
    }
}

fn read_times(path: &Path) -> FileTimes {
    match fs::metadata(path) {
        Ok(meta) => FileTimes {
            created: meta.created().ok().map(DateTime::from),
            modified: meta.modified().ok().map(DateTime::from),
        },
        Err(e) => {
            tracing::debug!("No metadata for {}: {}", path.display(), e);
            FileTimes::default()
        }
    }
}

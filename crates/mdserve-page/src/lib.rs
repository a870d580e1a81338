//! Document pipeline and render cache.
//!
//! Resolves where a requested document comes from (disk or a remote content
//! site), renders it through the Markdown renderer and an optional layout,
//! and caches the result with invalidation tied to the files it was built from.

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod layout;
pub mod source;

pub use cache::{
    cache_key, CachePolicy, Dependency, Fingerprint, RenderCache, Renderable, Rendered,
};
pub use config::{ConfigError, ConfigProvider, SiteConfig};
pub use document::{
    Document, Download, PageResponse, Site, HTML_CONTENT_TYPE, MARKDOWN_CONTENT_TYPE,
};
pub use error::PageError;
pub use export::{ExportError, ExportResult, SiteExporter};
pub use layout::{LayoutEngine, LayoutError};
pub use source::{
    is_document_path, ContentResolver, ContentSource, HttpRemoteSource, PageRequest,
    RemoteContentSource, RemoteError, SiteIdentity,
};

//! Static export of a whole site.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::document::Site;
use crate::error::PageError;
use crate::source::{is_document_path, PageRequest};

/// Result of an export.
#[derive(Debug)]
pub struct ExportResult {
    /// Number of pages written
    pub pages: usize,

    /// Total export time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that can occur during export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to read document root: {0}")]
    ReadError(String),

    #[error("Failed to render {path}: {source}")]
    Render {
        path: String,
        #[source]
        source: PageError,
    },

    #[error("Failed to write output: {0}")]
    WriteError(String),

    #[error("{first} and {second} would both be written to {}", output.display())]
    OutputCollision {
        first: String,
        second: String,
        output: PathBuf,
    },
}

/// A document found under the root.
#[derive(Debug)]
struct ExportPage {
    /// URL path, e.g. `/guide/intro.md`
    url_path: String,

    /// Where the HTML goes
    output_path: PathBuf,
}

/// Renders every document of a site into an output directory.
pub struct SiteExporter<'a> {
    site: &'a Site,
    output_dir: PathBuf,
}

impl<'a> SiteExporter<'a> {
    pub fn new(site: &'a Site, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            site,
            output_dir: output_dir.into(),
        }
    }

    /// Render all documents in parallel.
    pub fn export(&self) -> Result<ExportResult, ExportError> {
        let start = Instant::now();

        fs::create_dir_all(&self.output_dir)
            .map_err(|e| ExportError::WriteError(e.to_string()))?;
        let output_dir = self
            .output_dir
            .canonicalize()
            .map_err(|e| ExportError::WriteError(e.to_string()))?;

        let pages = self.discover_pages(&output_dir)?;

        pages
            .par_iter()
            .map(|page| self.export_page(page))
            .collect::<Result<Vec<()>, ExportError>>()?;

        let duration = start.elapsed();
        tracing::info!("Exported {} pages in {}ms", pages.len(), duration.as_millis());

        Ok(ExportResult {
            pages: pages.len(),
            duration_ms: duration.as_millis() as u64,
            output_dir,
        })
    }

    /// Find all documents under the root, skipping the output directory.
    fn discover_pages(&self, output_dir: &Path) -> Result<Vec<ExportPage>, ExportError> {
        let root = self.site.root();
        if !root.is_dir() {
            return Err(ExportError::ReadError(format!(
                "Document root not found: {}",
                root.display()
            )));
        }

        let mut pages = Vec::new();
        let mut outputs: HashMap<PathBuf, String> = HashMap::new();
        for entry in WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.path() != output_dir)
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let relative = path.strip_prefix(root).unwrap_or(path);
            let url_path = format!(
                "/{}",
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            );
            if !is_document_path(&url_path) {
                continue;
            }

            let output_path = output_dir.join(relative).with_extension("html");
            if let Some(first) = outputs.insert(output_path.clone(), url_path.clone()) {
                let (first, second) = if first < url_path {
                    (first, url_path)
                } else {
                    (url_path, first)
                };
                return Err(ExportError::OutputCollision {
                    first,
                    second,
                    output: output_path,
                });
            }

            pages.push(ExportPage {
                url_path,
                output_path,
            });
        }

        pages.sort_by(|a, b| a.url_path.cmp(&b.url_path));
        Ok(pages)
    }

    fn export_page(&self, page: &ExportPage) -> Result<(), ExportError> {
        let page_error = |source: PageError| ExportError::Render {
            path: page.url_path.clone(),
            source,
        };

        let doc = self
            .site
            .open(&PageRequest::local(page.url_path.as_str()))
            .map_err(page_error)?;
        let html = doc.html().map_err(page_error)?;

        if let Some(parent) = page.output_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ExportError::WriteError(e.to_string()))?;
        }
        fs::write(&page.output_path, html).map_err(|e| ExportError::WriteError(e.to_string()))?;

        tracing::debug!("Wrote {}", page.output_path.display());
        Ok(())
    }
}

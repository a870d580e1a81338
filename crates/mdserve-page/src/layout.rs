//! Layout composition for rendered pages.
//!
//! A layout is a minijinja template stored under the document root. It
//! receives the rendered page as `content` and may include partials; every
//! template file loaded along the way is reported back so the page cache can
//! watch it.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use minijinja::{context, Environment, Error, ErrorKind};

use mdserve_mdx::FrontMatter;

use crate::cache::Dependency;

/// Values exposed to a layout template.
#[derive(Debug, Clone)]
pub struct LayoutContext<'a> {
    /// Page title
    pub title: &'a str,
    /// Rendered page HTML
    pub content: &'a str,
    /// File name of the document
    pub file_name: &'a str,
    /// Creation time, formatted
    pub date_created: Option<String>,
    /// Last modification time, formatted
    pub date_modified: Option<String>,
    /// Base URL of the site
    pub base_url: &'a str,
    /// Front matter fields, exposed as `fm.<key>`
    pub front_matter: &'a FrontMatter,
}

/// Output of a layout composition.
#[derive(Debug, Clone)]
pub struct Composed {
    pub html: String,
    /// Template files read while composing, in load order
    pub dependencies: Vec<Dependency>,
}

/// Errors that can occur when composing a layout.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("Invalid template name: {0}")]
    InvalidName(String),

    #[error("Template error: {0}")]
    Template(#[from] Error),
}

/// Template engine that loads layouts from the document root.
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    root: PathBuf,
}

impl LayoutEngine {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Resolve a template name to a file under the root.
    fn template_path(root: &Path, name: &str) -> Option<PathBuf> {
        let mut path = root.to_path_buf();
        for segment in name.split('/') {
            match segment {
                "" | "." => {}
                ".." => return None,
                s if s.contains('\\') => return None,
                s => path.push(s),
            }
        }
        Some(path)
    }

    /// Render `ctx` into the template `template_name`.
    pub fn compose(
        &self,
        template_name: &str,
        ctx: &LayoutContext<'_>,
    ) -> Result<Composed, LayoutError> {
        if Self::template_path(&self.root, template_name).is_none() {
            return Err(LayoutError::InvalidName(template_name.to_string()));
        }

        let loaded = Arc::new(Mutex::new(Vec::new()));
        let mut env = Environment::new();

        let root = self.root.clone();
        let record = Arc::clone(&loaded);
        env.set_loader(move |name| {
            let Some(path) = Self::template_path(&root, name) else {
                return Ok(None);
            };
            let dependency = Dependency::capture(&path);
            match fs::read_to_string(&path) {
                Ok(source) => {
                    if let Ok(mut loaded) = record.lock() {
                        loaded.push(dependency);
                    }
                    Ok(Some(source))
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(Error::new(
                    ErrorKind::InvalidOperation,
                    format!("could not read template {}", path.display()),
                )
                .with_source(e)),
            }
        });

        let fm: BTreeMap<&str, &str> = ctx.front_matter.iter().collect();
        let html = env.get_template(template_name)?.render(context! {
            title => ctx.title,
            content => ctx.content,
            filename => ctx.file_name,
            date_created => &ctx.date_created,
            date_modified => &ctx.date_modified,
            base_url => ctx.base_url,
            fm => fm,
        })?;

        let dependencies = loaded.lock().map(|l| l.clone()).unwrap_or_default();
        Ok(Composed { html, dependencies })
    }
}

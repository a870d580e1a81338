//! Errors produced by the document pipeline.

use std::io;
use std::path::{Path, PathBuf};

use mdserve_mdx::RenderError;

/// Errors that can occur while resolving or rendering a page.
///
/// `NotFound` and `Forbidden` are meant to be shown to the client; the other
/// variants are internal failures.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Failed to render {path}: {source}")]
    Render {
        path: String,
        #[source]
        source: RenderError,
    },

    #[error("Failed to apply layout to {path}: {message}")]
    Layout { path: String, message: String },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PageError {
    /// Classify an I/O error raised while accessing `path`.
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.display().to_string()),
            io::ErrorKind::PermissionDenied => Self::Forbidden(path.display().to_string()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_io_errors() {
        let path = Path::new("/srv/site/a.md");

        let missing = PageError::from_io(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(missing.is_not_found());

        let denied = PageError::from_io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(denied.is_forbidden());

        let other = PageError::from_io(path, io::Error::other("disk on fire"));
        assert!(matches!(other, PageError::Io { .. }));
    }
}

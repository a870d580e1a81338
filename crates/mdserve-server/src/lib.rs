//! HTTP server for mdserve sites.
//!
//! Serves rendered Markdown documents through the page pipeline, falls back
//! to static files for everything else, and watches the document root so
//! cached pages are dropped when their sources change.

pub mod server;
pub mod watcher;

pub use server::{MdServer, PageFailure, ServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent};

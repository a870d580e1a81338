//! Front matter, titles and Markdown rendering.
//!
//! This crate holds the text-level building blocks of mdserve: it splits a
//! document into front matter and content, derives its title, converts
//! Markdown to HTML and rewrites `~/` virtual paths.

pub mod emoji;
pub mod frontmatter;
pub mod paths;
pub mod render;
pub mod title;

pub use frontmatter::{extract_front_matter, FrontMatter};
pub use paths::rewrite_virtual_paths;
pub use render::{CmarkRenderer, MarkdownRenderer, RenderError, RenderOptions};
pub use title::{file_stem, is_literal_html, resolve_title, HTML_EXTENSION};

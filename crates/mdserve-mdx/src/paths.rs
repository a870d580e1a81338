//! Virtual path rewriting.
//!
//! Links written as `~/path` are relative to the site root rather than the
//! current page. They are rewritten to the configured base URL after rendering.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static VIRTUAL_ATTR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\b(href|src)(\s*=\s*)(["'])~/"#).unwrap());

/// Rewrite `href="~/..."` and `src="~/..."` attributes to start with `base_url`.
pub fn rewrite_virtual_paths(html: &str, base_url: &str) -> String {
    let base = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{base_url}/")
    };

    VIRTUAL_ATTR_PATTERN
        .replace_all(html, |caps: &Captures| {
            format!("{}{}{}{}", &caps[1], &caps[2], &caps[3], base)
        })
        .into_owned()
}

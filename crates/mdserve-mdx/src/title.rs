//! Page title derivation.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::frontmatter::FrontMatter;

/// Extension (without dot) of documents whose content is literal HTML.
pub const HTML_EXTENSION: &str = "mdh";

/// A level-1 ATX heading: a single `#`, a space, then the text.
static H1_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*#[ \t](.*)$").unwrap());

/// Check whether a file name selects literal-HTML mode.
pub fn is_literal_html(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(HTML_EXTENSION))
}

/// File name without its extension.
pub fn file_stem(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
}

/// Resolve the title of a document.
///
/// First match wins:
/// 1. the front matter `title`, when non-empty
/// 2. the file stem, for literal-HTML documents
/// 3. the text of the first `# Heading` line in the content, unless it is empty
/// 4. the file stem
pub fn resolve_title(front_matter: &FrontMatter, content: &str, file_name: &str) -> String {
    if let Some(title) = front_matter.get_non_empty("title") {
        return title.to_string();
    }

    if is_literal_html(file_name) {
        return file_stem(file_name).to_string();
    }

    first_heading(content)
        .unwrap_or_else(|| file_stem(file_name))
        .to_string()
}

/// Text of the first level-1 heading, if there is one and it is not blank.
fn first_heading(content: &str) -> Option<&str> {
    let text = H1_PATTERN.captures(content)?.get(1)?.as_str().trim();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn front_matter_title_wins() {
        let fm = FrontMatter::parse_block("title: From Meta");

        let title = resolve_title(&fm, "# From Content", "page.md");

        assert_eq!(title, "From Meta");
    }

    #[test]
    fn empty_front_matter_title_is_ignored() {
        let fm = FrontMatter::parse_block("title:   ");

        let title = resolve_title(&fm, "# Heading", "page.md");

        assert_eq!(title, "Heading");
    }

    #[test]
    fn uses_first_h1() {
        let content = "Intro\n\n## Not this\n# First\n\n# Second\n";

        let title = resolve_title(&FrontMatter::default(), content, "page.md");

        assert_eq!(title, "First");
    }

    #[test]
    fn empty_first_heading_falls_back_to_file_stem() {
        let content = "# \nbody\n# Later Section\n";

        let title = resolve_title(&FrontMatter::default(), content, "page.md");

        assert_eq!(title, "page");
    }

    #[test]
    fn trims_carriage_return() {
        let title = resolve_title(&FrontMatter::default(), "# Heading\r\nBody", "page.md");

        assert_eq!(title, "Heading");
    }

    #[test]
    fn literal_html_uses_file_stem() {
        let title = resolve_title(&FrontMatter::default(), "# Looks like md", "landing.mdh");

        assert_eq!(title, "landing");
    }

    #[test]
    fn falls_back_to_file_stem() {
        let title = resolve_title(&FrontMatter::default(), "no headings", "notes.md");

        assert_eq!(title, "notes");
    }

    #[test]
    fn requires_space_after_marker() {
        let title = resolve_title(&FrontMatter::default(), "#hashtag\n", "tags.md");

        assert_eq!(title, "tags");
    }

    #[test]
    fn detects_literal_html() {
        assert!(is_literal_html("index.mdh"));
        assert!(is_literal_html("INDEX.MDH"));
        assert!(!is_literal_html("index.md"));
        assert!(!is_literal_html("mdh"));
    }
}

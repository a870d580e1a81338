//! Front matter extraction and parsing.
//!
//! Front matter is a flat block of `key: value` lines at the very start of a
//! document, opened and closed by a line containing exactly `---`:
//!
//! ```text
//! ---
//! title: My Post
//! author: Jane
//! ---
//! # Body starts here
//! ```

use std::collections::HashMap;

/// Marker line that opens and closes a front matter block.
pub const MARKER: &str = "---";

/// Parsed front matter of a document.
///
/// Keys are case-insensitive. Missing keys yield `None` rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    /// Values by lowercased key
    fields: HashMap<String, String>,
}

impl FrontMatter {
    /// Parse the lines between the two markers.
    ///
    /// Each line is split on its first colon. Lines without a colon, or with an
    /// empty key, are skipped.
    pub fn parse_block(block: &str) -> Self {
        let fields = block
            .lines()
            .filter_map(|line| {
                let (key, value) = line.split_once(':')?;
                let key = key.trim();
                if key.is_empty() {
                    return None;
                }
                Some((key.to_lowercase(), value.trim().to_string()))
            })
            .collect();

        Self { fields }
    }

    /// Look up a value (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Look up a value, treating an empty string as missing.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(lowercased key, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Extract front matter from document text.
///
/// Returns the parsed front matter and the remaining content. The block is
/// closed by the *first* marker line after the opening one, and exactly one
/// line terminator following the closing marker is removed with it. Text
/// without a well-formed block is returned untouched with empty front matter.
pub fn extract_front_matter(source: &str) -> (FrontMatter, &str) {
    let Some(after_open) = strip_opening_marker(source) else {
        return (FrontMatter::default(), source);
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        let bare = line.strip_suffix('\n').unwrap_or(line);
        let bare = bare.strip_suffix('\r').unwrap_or(bare);

        if bare == MARKER {
            let block = &after_open[..offset];
            let remaining = strip_line_terminator(&after_open[offset + MARKER.len()..]);
            return (FrontMatter::parse_block(block), remaining);
        }

        offset += line.len();
    }

    (FrontMatter::default(), source)
}

/// Return the text after the opening marker line, if the source starts with one.
fn strip_opening_marker(source: &str) -> Option<&str> {
    let line_end = source.find('\n')?;
    let first = &source[..line_end];
    let first = first.strip_suffix('\r').unwrap_or(first);

    (first == MARKER).then(|| &source[line_end + 1..])
}

/// Remove a single leading `\r\n` or `\n`, if present.
fn strip_line_terminator(text: &str) -> &str {
    text.strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_valid_front_matter() {
        let source = "---\ntitle: My Post\nauthor: Jane\n---\n# Body starts here\n";

        let (fm, content) = extract_front_matter(source);

        assert_eq!(fm.get("title"), Some("My Post"));
        assert_eq!(fm.get("author"), Some("Jane"));
        assert_eq!(content, "# Body starts here\n");
    }

    #[test]
    fn removes_exactly_one_line_terminator() {
        let source = "---\ntitle: T\n---\n\n\nBody";

        let (_, content) = extract_front_matter(source);

        assert_eq!(content, "\n\nBody");
    }

    #[test]
    fn handles_crlf_line_endings() {
        let source = "---\r\ntitle: Windows\r\n---\r\nBody\r\n";

        let (fm, content) = extract_front_matter(source);

        assert_eq!(fm.get("title"), Some("Windows"));
        assert_eq!(content, "Body\r\n");
    }

    #[test]
    fn handles_no_front_matter() {
        let source = "# Just Markdown\n\nNo front matter here.";

        let (fm, content) = extract_front_matter(source);

        assert!(fm.is_empty());
        assert_eq!(content, source);

        let (again, content_again) = extract_front_matter(content);
        assert!(again.is_empty());
        assert_eq!(content_again, source);
    }

    #[test]
    fn block_only_document_has_empty_content() {
        let (fm, content) = extract_front_matter("---\ntitle: Only\n---");
        assert_eq!(fm.get("title"), Some("Only"));
        assert_eq!(content, "");

        let (_, content) = extract_front_matter("---\ntitle: Only\n---\n");
        assert_eq!(content, "");
    }

    #[test]
    fn closes_at_first_marker() {
        let source = "---\na: 1\n---\nmiddle\n---\nb: 2\n---\nend";

        let (fm, content) = extract_front_matter(source);

        assert_eq!(fm.len(), 1);
        assert_eq!(fm.get("a"), Some("1"));
        assert_eq!(fm.get("b"), None);
        assert_eq!(content, "middle\n---\nb: 2\n---\nend");
    }

    #[test]
    fn unclosed_block_is_not_front_matter() {
        let source = "---\ntitle: Test\n# No closing";

        let (fm, content) = extract_front_matter(source);

        assert!(fm.is_empty());
        assert_eq!(content, source);
    }

    #[test]
    fn block_must_start_at_offset_zero() {
        let source = "\n---\ntitle: Late\n---\nBody";

        let (fm, content) = extract_front_matter(source);

        assert!(fm.is_empty());
        assert_eq!(content, source);
    }

    #[test]
    fn marker_line_must_be_exact() {
        let source = "----\ntitle: Rule\n----\nBody";

        let (fm, content) = extract_front_matter(source);

        assert!(fm.is_empty());
        assert_eq!(content, source);
    }

    #[test]
    fn splits_on_first_colon_and_skips_malformed_lines() {
        let source = "---\nurl: https://example.com:8080/x\nno colon here\n: orphan value\n---\n";

        let (fm, _) = extract_front_matter(source);

        assert_eq!(fm.len(), 1);
        assert_eq!(fm.get("url"), Some("https://example.com:8080/x"));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let fm = FrontMatter::parse_block("Title: Mixed Case\nUseEmoji: 0");

        assert_eq!(fm.get("title"), Some("Mixed Case"));
        assert_eq!(fm.get("TITLE"), Some("Mixed Case"));
        assert_eq!(fm.get("useemoji"), Some("0"));
        assert_eq!(fm.get("missing"), None);
    }

    #[test]
    fn empty_values_are_kept_but_not_non_empty() {
        let fm = FrontMatter::parse_block("title:");

        assert_eq!(fm.get("title"), Some(""));
        assert_eq!(fm.get_non_empty("title"), None);
    }

    #[test]
    fn stripped_content_matches_original_minus_block() {
        let cases = [
            ("---\nk: v\n---\nrest\n", "---\nk: v\n---\n"),
            ("---\n---\nrest", "---\n---\n"),
            ("---\nmulti\nline\nblock: yes\n---\n\nrest", "---\nmulti\nline\nblock: yes\n---\n"),
        ];

        for (source, block) in cases {
            let (_, content) = extract_front_matter(source);
            assert_eq!(content, &source[block.len()..], "source: {source:?}");
        }
    }
}

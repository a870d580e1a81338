//! Markdown to HTML conversion.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd, TextMergeStream};

use crate::emoji;

/// Options controlling Markdown conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Replace `:shortcodes:` and smileys with emoji
    pub emoji: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { emoji: true }
    }
}

/// Errors that can occur while rendering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Markdown rendering failed: {0}")]
    Failed(String),
}

/// Converts Markdown text to an HTML fragment.
pub trait MarkdownRenderer: Send + Sync {
    /// Render `source` to HTML.
    fn render(&self, source: &str, options: &RenderOptions) -> Result<String, RenderError>;
}

/// [`MarkdownRenderer`] backed by pulldown-cmark.
#[derive(Debug, Clone, Copy, Default)]
pub struct CmarkRenderer;

impl CmarkRenderer {
    pub fn new() -> Self {
        Self
    }

    fn parser_options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_HEADING_ATTRIBUTES
    }
}

impl MarkdownRenderer for CmarkRenderer {
    fn render(&self, source: &str, options: &RenderOptions) -> Result<String, RenderError> {
        let parser = TextMergeStream::new(Parser::new_ext(source, Self::parser_options()));

        let mut html_output = String::with_capacity(source.len() * 3 / 2);

        if options.emoji {
            let mut in_code_block = false;
            let events = parser.map(|event| match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    Event::Start(Tag::CodeBlock(kind))
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    Event::End(TagEnd::CodeBlock)
                }
                Event::Text(text) if !in_code_block => {
                    Event::Text(CowStr::from(emoji::substitute(&text).into_owned()))
                }
                other => other,
            });
            html::push_html(&mut html_output, events);
        } else {
            html::push_html(&mut html_output, parser);
        }

        Ok(html_output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(md: &str, emoji: bool) -> String {
        CmarkRenderer::new()
            .render(md, &RenderOptions { emoji })
            .unwrap()
    }

    #[test]
    fn renders_markdown() {
        let html = render("# Hello\n\nWorld", true);

        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("<p>World</p>"));
    }

    #[test]
    fn renders_tables_and_strikethrough() {
        let html = render("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~", false);

        assert!(html.contains("<table>"));
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn substitutes_emoji_when_enabled() {
        assert!(render("Launch :rocket:", true).contains("Launch 🚀"));
        assert!(render("Launch :rocket:", false).contains("Launch :rocket:"));
    }

    #[test]
    fn leaves_code_untouched() {
        let html = render("```\n:rocket: :)\n```\n\n`:tada:`", true);

        assert!(html.contains(":rocket: :)"));
        assert!(html.contains("<code>:tada:</code>"));
    }

    #[test]
    fn default_options_enable_emoji() {
        assert!(RenderOptions::default().emoji);
    }
}

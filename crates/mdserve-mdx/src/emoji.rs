//! Emoji shortcode and smiley substitution.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static SHORTCODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([a-z0-9_+\-]+):").unwrap());

/// Known `:shortcode:` names.
const SHORTCODES: &[(&str, &str)] = &[
    ("+1", "👍"),
    ("-1", "👎"),
    ("blush", "😊"),
    ("bug", "🐛"),
    ("check", "✔️"),
    ("cry", "😢"),
    ("fire", "🔥"),
    ("grin", "😁"),
    ("heart", "❤️"),
    ("heavy_check_mark", "✔️"),
    ("joy", "😂"),
    ("laughing", "😆"),
    ("memo", "📝"),
    ("rocket", "🚀"),
    ("smile", "😄"),
    ("smiley", "😃"),
    ("sparkles", "✨"),
    ("star", "⭐"),
    ("tada", "🎉"),
    ("thinking", "🤔"),
    ("thumbsdown", "👎"),
    ("thumbsup", "👍"),
    ("warning", "⚠️"),
    ("wink", "😉"),
    ("x", "❌"),
];

/// ASCII smileys. Only replaced when they form a whole whitespace-separated word.
const SMILEYS: &[(&str, &str)] = &[
    (":)", "🙂"),
    (":-)", "🙂"),
    (":(", "🙁"),
    (":-(", "🙁"),
    (";)", "😉"),
    (";-)", "😉"),
    (":D", "😃"),
    (":-D", "😃"),
    (":P", "😛"),
    (":-P", "😛"),
    (":o", "😮"),
    (":'(", "😢"),
    ("<3", "❤️"),
];

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Replace emoji shortcodes and smileys in a run of plain text.
pub fn substitute(text: &str) -> Cow<'_, str> {
    let replaced = SHORTCODE_PATTERN.replace_all(text, |caps: &Captures| {
        lookup(SHORTCODES, &caps[1])
            .map(str::to_string)
            .unwrap_or_else(|| caps[0].to_string())
    });

    if !SMILEYS.iter().any(|(s, _)| replaced.contains(s)) {
        return replaced;
    }

    let mut out = String::with_capacity(replaced.len());
    for piece in replaced.split_inclusive(char::is_whitespace) {
        let word = piece.trim_end_matches(char::is_whitespace);
        match lookup(SMILEYS, word) {
            Some(emoji) => {
                out.push_str(emoji);
                out.push_str(&piece[word.len()..]);
            }
            None => out.push_str(piece),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_known_shortcodes() {
        assert_eq!(substitute("Ship it :rocket: :tada:"), "Ship it 🚀 🎉");
    }

    #[test]
    fn keeps_unknown_shortcodes() {
        assert_eq!(substitute("time :10:30: and :nope:"), "time :10:30: and :nope:");
    }

    #[test]
    fn replaces_standalone_smileys() {
        assert_eq!(substitute("Thanks :) see you ;)"), "Thanks 🙂 see you 😉");
        assert_eq!(substitute(":D"), "😃");
    }

    #[test]
    fn ignores_smileys_inside_words() {
        assert_eq!(substitute("std::(x) and a:)b"), "std::(x) and a:)b");
    }

    #[test]
    fn borrows_when_nothing_changes() {
        assert!(matches!(substitute("plain text"), Cow::Borrowed(_)));
    }
}

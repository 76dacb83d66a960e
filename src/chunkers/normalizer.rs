//! Whitespace and line-ending canonicalization.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Windows and old-Mac line endings
    static ref LINE_BREAKS: Regex = Regex::new(r"\r\n?").unwrap();
    /// Tabs, vertical tab, form feed and the Unicode space variants
    static ref HORIZONTAL_SPACE: Regex = Regex::new(concat!(
        r"[\t\x0B\x0C\x{00A0}\x{1680}",
        r"\x{2000}-\x{200A}\x{202F}\x{205F}\x{3000}]"
    ))
    .unwrap();
    static ref MULTIPLE_SPACES: Regex = Regex::new(r" {2,}").unwrap();
    /// Two or more line breaks once lines are trimmed
    static ref PARAGRAPH_BREAK: Regex = Regex::new(r"\n{2,}").unwrap();
}

/// Canonicalizes whitespace before segmentation.
///
/// Line endings become `\n`, horizontal whitespace collapses to one space,
/// every line is trimmed, and any run of blank lines becomes exactly one
/// paragraph break. The result is trimmed. Normalizing twice is the same as
/// normalizing once.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize `text`. Empty input passes through.
    pub fn normalize(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let text = LINE_BREAKS.replace_all(text, "\n");
        let text = HORIZONTAL_SPACE.replace_all(&text, " ");
        let text = MULTIPLE_SPACES.replace_all(&text, " ");

        let trimmed_lines = text
            .split('\n')
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n");

        PARAGRAPH_BREAK
            .replace_all(&trimmed_lines, "\n\n")
            .trim()
            .to_string()
    }
}

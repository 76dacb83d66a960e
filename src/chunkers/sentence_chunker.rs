//! Sentence boundary detection.

use unicode_segmentation::UnicodeSegmentation;

use crate::types::Span;

/// Splits text into sentences using Unicode sentence boundaries (UAX #29).
///
/// Sentence spans are contiguous and cover the input: trailing whitespace
/// belongs to the sentence before it, and whitespace-only pieces are folded
/// into their predecessor.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentenceSplitter;

impl SentenceSplitter {
    pub fn new() -> Self {
        Self
    }

    /// Sentence spans covering `text`.
    pub fn split(&self, text: &str) -> Vec<Span> {
        let mut spans: Vec<Span> = Vec::new();

        for (offset, sentence) in text.split_sentence_bound_indices() {
            let span = Span::new(offset, offset + sentence.len());
            match spans.last_mut() {
                Some(previous) if sentence.trim().is_empty() => previous.end = span.end,
                _ => spans.push(span),
            }
        }

        spans
    }

    /// First and last sentence of `text`, trimmed.
    ///
    /// Falls back to the whole trimmed text when no sentence can be extracted.
    pub fn edges<'a>(&self, text: &'a str) -> (&'a str, &'a str) {
        let mut sentences = text
            .split_sentence_bounds()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let first = match sentences.next() {
            Some(first) => first,
            None => {
                let whole = text.trim();
                return (whole, whole);
            }
        };
        let last = sentences.last().unwrap_or(first);
        (first, last)
    }
}

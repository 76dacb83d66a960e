//! Separator-hierarchy splitter.

use std::sync::Arc;

use tracing::debug;

use super::base::{absorb_undersized, spans_to_segments, RawSpan, TokenEstimator};
use crate::types::{BoundaryKind, Segment, SegmentationConfig};

/// Splits text hierarchically using an ordered list of separators.
///
/// Separators are tried in order of preference (for the defaults: blank-line
/// runs, blank lines, lines, sentence endings, words). A span only descends to
/// a finer separator if it is still over the token budget. When no separator
/// occurs, a whitespace pass packs whole words; a single word that is still
/// too large becomes one oversized segment.
///
/// Splitting is driven by an explicit work-list instead of recursion, and
/// every piece's offset is derived from its parent frame, so repeated
/// substrings never confuse span tracking.
pub struct SeparatorSplitter {
    estimator: Arc<dyn TokenEstimator>,
}

/// A unit of pending work on the stack.
enum Work {
    Span {
        start: usize,
        end: usize,
        separator_index: usize,
        kind: BoundaryKind,
    },
    /// Close the accumulation buffer before the next piece
    Break,
}

/// Output of the decomposition phase, in document order.
enum Event {
    Atom(RawSpan),
    Break,
}

impl SeparatorSplitter {
    /// Create a splitter using the given token estimator.
    pub fn new(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self { estimator }
    }

    /// Split normalized `text` into segments.
    ///
    /// Spans of the returned segments are contiguous and cover `text` exactly.
    pub fn split(&self, text: &str, config: &SegmentationConfig) -> Vec<Segment> {
        let spans = self.split_range(text, 0, text.len(), config);
        spans_to_segments(text, &spans, self.estimator.as_ref(), config.budget())
    }

    /// Split `text[start..end]` into raw spans, undersized fragments repaired.
    pub(crate) fn split_range(
        &self,
        text: &str,
        start: usize,
        end: usize,
        config: &SegmentationConfig,
    ) -> Vec<RawSpan> {
        if start >= end {
            return vec![];
        }

        let events = self.decompose(text, start, end, config);
        let mut spans = self.accumulate(text, events, config);
        absorb_undersized(
            text,
            &mut spans,
            self.estimator.as_ref(),
            config.min_chunk_size,
            config.budget(),
        );

        debug!(
            start,
            end,
            spans = spans.len(),
            "Separator splitting complete"
        );
        spans
    }

    /// Break the range into atoms that fit the budget (or cannot be split).
    fn decompose(
        &self,
        text: &str,
        start: usize,
        end: usize,
        config: &SegmentationConfig,
    ) -> Vec<Event> {
        let budget = config.budget();
        let separators = &config.separators;
        let mut events = Vec::new();
        let mut stack = vec![Work::Span {
            start,
            end,
            separator_index: 0,
            kind: BoundaryKind::Paragraph,
        }];

        while let Some(work) = stack.pop() {
            let (start, end, separator_index, kind) = match work {
                Work::Break => {
                    events.push(Event::Break);
                    continue;
                }
                Work::Span {
                    start,
                    end,
                    separator_index,
                    kind,
                } => (start, end, separator_index, kind),
            };

            let slice = &text[start..end];
            if self.estimator.estimate(slice) <= budget {
                events.push(Event::Atom(RawSpan::new(start, end, kind)));
                continue;
            }

            let (pieces, next_index, piece_kind) =
                match find_split(slice, separators, separator_index) {
                    Some((index, pieces)) => {
                        (pieces, index + 1, BoundaryKind::for_separator(&separators[index]))
                    }
                    None => (word_pieces(slice), separators.len(), BoundaryKind::Word),
                };

            if pieces.len() < 2 {
                // A single word over budget: nothing left to cut.
                events.push(Event::Atom(RawSpan::new(start, end, kind)));
                continue;
            }

            // Pushed in reverse so pieces pop in document order.
            stack.push(Work::Break);
            let last = pieces.len() - 1;
            for (i, &(piece_start, piece_end)) in pieces.iter().enumerate().rev() {
                stack.push(Work::Span {
                    start: start + piece_start,
                    end: start + piece_end,
                    separator_index: next_index,
                    kind: if i == last { kind } else { piece_kind },
                });
            }
            stack.push(Work::Break);
        }

        events
    }

    /// Pack atoms greedily into buffers no larger than the budget.
    fn accumulate(
        &self,
        text: &str,
        events: Vec<Event>,
        config: &SegmentationConfig,
    ) -> Vec<RawSpan> {
        let budget = config.budget();
        let mut spans = Vec::new();
        let mut buffer: Option<RawSpan> = None;

        for event in events {
            match event {
                Event::Break => {
                    // Undersized buffers carry over into the next run.
                    if let Some(current) = buffer.take() {
                        if self.estimator.estimate(current.text(text)) >= config.min_chunk_size {
                            spans.push(current);
                        } else {
                            buffer = Some(current);
                        }
                    }
                }
                Event::Atom(atom) => {
                    buffer = Some(match buffer.take() {
                        None => atom,
                        Some(current) => {
                            if self.estimator.estimate(&text[current.start..atom.end]) <= budget {
                                RawSpan::new(current.start, atom.end, atom.kind)
                            } else {
                                spans.push(current);
                                atom
                            }
                        }
                    });
                }
            }
        }

        if let Some(current) = buffer {
            spans.push(current);
        }

        spans
    }
}

/// Find the first separator at or after `from` that cuts `text` into at
/// least two pieces. Returns the separator index and piece ranges.
fn find_split(
    text: &str,
    separators: &[String],
    from: usize,
) -> Option<(usize, Vec<(usize, usize)>)> {
    separators
        .iter()
        .enumerate()
        .skip(from)
        .find_map(|(index, separator)| {
            let pieces = split_keeping_separator(text, separator);
            (pieces.len() > 1).then_some((index, pieces))
        })
}

/// Split on `separator`, keeping it as the suffix of every piece but the last.
///
/// An empty separator splits between characters.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<(usize, usize)> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| (i, i + c.len_utf8()))
            .collect();
    }

    let mut pieces = Vec::new();
    let mut cursor = 0;
    for (position, matched) in text.match_indices(separator) {
        let cut = position + matched.len();
        if cut > cursor {
            pieces.push((cursor, cut));
            cursor = cut;
        }
    }
    if cursor < text.len() {
        pieces.push((cursor, text.len()));
    }
    pieces
}

/// Split into words, each carrying its trailing whitespace.
fn word_pieces(text: &str) -> Vec<(usize, usize)> {
    let mut pieces = Vec::new();
    let mut piece_start = 0;
    let mut previous_was_space = false;
    let mut seen_word = false;

    for (i, c) in text.char_indices() {
        let is_space = c.is_whitespace();
        if !is_space {
            // Leading whitespace stays attached to the first word.
            if previous_was_space && seen_word {
                pieces.push((piece_start, i));
                piece_start = i;
            }
            seen_word = true;
        }
        previous_was_space = is_space;
    }
    if piece_start < text.len() {
        pieces.push((piece_start, text.len()));
    }
    pieces
}

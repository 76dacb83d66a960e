//! Token estimation and span helpers shared by all segmenters.

use anyhow::Result;
use tracing::warn;

use crate::types::{BoundaryKind, Segment, Span};

/// Approximates how many model tokens a text span will cost.
///
/// Implementations must return 0 only for empty input and should grow with
/// the length of the text.
pub trait TokenEstimator: Send + Sync {
    /// Estimate the number of tokens in `text`.
    fn estimate(&self, text: &str) -> usize;

    /// Get the name of this estimator.
    fn name(&self) -> &'static str {
        "custom"
    }
}

impl<F> TokenEstimator for F
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn estimate(&self, text: &str) -> usize {
        self(text)
    }
}

/// Tokenizer-free estimator biased toward over-estimation.
///
/// Takes the larger of a word-based estimate (`words * 4 / 3`) and a
/// character-based one (`chars / 4`), both rounded up.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let words = text.split_whitespace().count();
        let chars = text.chars().count();
        let by_words = (words * 4).div_ceil(3);
        let by_chars = chars.div_ceil(4);
        by_words.max(by_chars).max(1)
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

/// Exact estimator backed by a tiktoken BPE.
pub struct TiktokenEstimator {
    bpe: tiktoken_rs::CoreBPE,
}

impl TiktokenEstimator {
    /// Create an estimator with the cl100k_base encoding (GPT-4/ChatGPT).
    pub fn new() -> Result<Self> {
        Self::with_encoding("cl100k_base")
    }

    /// Create an estimator with a specific encoding.
    pub fn with_encoding(encoding_name: &str) -> Result<Self> {
        let bpe = match encoding_name {
            "cl100k_base" => tiktoken_rs::cl100k_base()?,
            "p50k_base" => tiktoken_rs::p50k_base()?,
            "p50k_edit" => tiktoken_rs::p50k_edit()?,
            "r50k_base" => tiktoken_rs::r50k_base()?,
            other => anyhow::bail!("unknown tiktoken encoding: {other}"),
        };
        Ok(Self { bpe })
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn name(&self) -> &'static str {
        "tiktoken"
    }
}

/// Estimate tokens with the default heuristic.
pub fn estimate_tokens(text: &str) -> usize {
    HeuristicEstimator.estimate(text)
}

/// A contiguous piece of the normalized text before it becomes a [`Segment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawSpan {
    pub start: usize,
    pub end: usize,
    pub kind: BoundaryKind,
}

impl RawSpan {
    pub fn new(start: usize, end: usize, kind: BoundaryKind) -> Self {
        Self { start, end, kind }
    }

    pub fn text<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// Fold segments below `min_size` into a neighbour.
///
/// The next neighbour is preferred, then the previous one; a merge only
/// happens when the joined span stays within `budget`. When neither fits, the
/// boundary with the next neighbour is moved forward word by word until the
/// fragment reaches `min_size`, provided the neighbour keeps at least
/// `min_size` itself. A fragment that none of these repair is kept rather
/// than dropped; only the last fragment of the text or one whose neighbour is
/// a single unsplittable word ends up there.
pub(crate) fn absorb_undersized(
    text: &str,
    spans: &mut Vec<RawSpan>,
    estimator: &dyn TokenEstimator,
    min_size: usize,
    budget: usize,
) {
    let mut i = 0;
    while spans.len() > 1 && i < spans.len() {
        if estimator.estimate(spans[i].text(text)) >= min_size {
            i += 1;
            continue;
        }

        if i + 1 < spans.len()
            && estimator.estimate(&text[spans[i].start..spans[i + 1].end]) <= budget
        {
            let next = spans.remove(i + 1);
            spans[i].end = next.end;
            spans[i].kind = next.kind;
            continue;
        }

        if i > 0 && estimator.estimate(&text[spans[i - 1].start..spans[i].end]) <= budget {
            let current = spans.remove(i);
            spans[i - 1].end = current.end;
            spans[i - 1].kind = current.kind;
            i -= 1;
            continue;
        }

        if i + 1 < spans.len() && borrow_from_next(text, spans, i, estimator, min_size, budget) {
            i += 1;
            continue;
        }

        warn!(
            start = spans[i].start,
            end = spans[i].end,
            min_size,
            "Undersized fragment has no neighbour with room, keeping as-is"
        );
        i += 1;
    }
}

/// Move the start of `spans[i + 1]` to the first word boundary that lifts
/// `spans[i]` to `min_size`. Returns false when no such boundary exists.
fn borrow_from_next(
    text: &str,
    spans: &mut [RawSpan],
    i: usize,
    estimator: &dyn TokenEstimator,
    min_size: usize,
    budget: usize,
) -> bool {
    let (start, next_start, next_end) = (spans[i].start, spans[i + 1].start, spans[i + 1].end);
    let next = &text[next_start..next_end];

    let word_starts = next.char_indices().filter_map(|(pos, c)| {
        let after_space = pos > 0 && next[..pos].ends_with(char::is_whitespace);
        (after_space && !c.is_whitespace()).then_some(next_start + pos)
    });

    for cut in word_starts {
        let head = estimator.estimate(&text[start..cut]);
        if head > budget {
            return false;
        }
        if head < min_size {
            continue;
        }
        if estimator.estimate(&text[cut..next_end]) < min_size {
            return false;
        }
        spans[i].end = cut;
        spans[i].kind = BoundaryKind::Word;
        spans[i + 1].start = cut;
        return true;
    }
    false
}

/// Turn raw spans into segments with token counts and the oversized flag.
pub(crate) fn spans_to_segments(
    text: &str,
    spans: &[RawSpan],
    estimator: &dyn TokenEstimator,
    budget: usize,
) -> Vec<Segment> {
    spans
        .iter()
        .map(|raw| {
            let span = Span::new(raw.start, raw.end);
            let token_count = estimator.estimate(raw.text(text));
            let mut segment = Segment::from_span(text, span, token_count, raw.kind);
            if token_count > budget {
                warn!(
                    start = raw.start,
                    end = raw.end,
                    token_count,
                    budget,
                    "Unsplittable unit exceeds token budget, emitting oversized segment"
                );
                segment.oversized = true;
            }
            segment
        })
        .collect()
}

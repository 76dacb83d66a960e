//! Segment type definitions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Half-open `[start, end)` byte range into the normalized input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Smallest span covering both `self` and `other`.
    pub fn union(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Slice the text this span was taken from.
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// What produced a segment's trailing edge.
///
/// Purely descriptive; no algorithm branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    /// Line or blank-line separator, or the end of the document
    Paragraph,
    /// Sentence-ending punctuation
    Sentence,
    /// Whitespace or character fallback
    Word,
    /// Distance spike between embeddings
    Semantic,
}

impl BoundaryKind {
    /// Classify a separator string.
    pub fn for_separator(separator: &str) -> Self {
        if separator.contains('\n') {
            BoundaryKind::Paragraph
        } else if separator.trim().is_empty() {
            BoundaryKind::Word
        } else {
            BoundaryKind::Sentence
        }
    }
}

impl std::fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundaryKind::Paragraph => write!(f, "paragraph"),
            BoundaryKind::Sentence => write!(f, "sentence"),
            BoundaryKind::Word => write!(f, "word"),
            BoundaryKind::Semantic => write!(f, "semantic"),
        }
    }
}

/// A bounded span of text plus metadata; the unit the engine produces.
///
/// Segments are created fresh per run and never mutated after being returned.
///
/// `token_count` is at least the configured minimum unless no neighbour can
/// absorb the fragment, or lend it leading words, while staying within the
/// budget and the minimum itself. In practice that is the last fragment of a
/// text whose final segment is already full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Deterministic identifier, unique within a run
    pub id: Uuid,

    /// Position of this segment in the produced sequence (0-indexed)
    pub index: usize,

    /// Text owned by the segment, including any injected overlap
    pub content: String,

    /// Pre-overlap range in the normalized input
    pub span: Span,

    /// Estimated token count of `content`
    pub token_count: usize,

    /// What produced the trailing edge
    pub boundary_kind: BoundaryKind,

    /// Internal coherence in `[0, 1]`; only set by semantic or hybrid runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f32>,

    /// Tokens copied in from the previous segment
    pub overlap_prefix_tokens: usize,

    /// Tokens of this segment's tail copied into the next segment
    pub overlap_suffix_tokens: usize,

    /// Set when a single unsplittable unit exceeds the token budget
    pub oversized: bool,
}

impl Segment {
    /// Create a segment owning exactly `span` of `text`.
    ///
    /// Identity (`id`, `index`) is assigned later by [`Segment::assign_identity`].
    pub fn from_span(
        text: &str,
        span: Span,
        token_count: usize,
        boundary_kind: BoundaryKind,
    ) -> Self {
        Self {
            id: Uuid::nil(),
            index: 0,
            content: span.slice(text).to_string(),
            span,
            token_count,
            boundary_kind,
            semantic_score: None,
            overlap_prefix_tokens: 0,
            overlap_suffix_tokens: 0,
            oversized: false,
        }
    }

    /// Set the semantic score, clamped into `[0, 1]`.
    pub fn with_score(mut self, score: f32) -> Self {
        self.semantic_score = Some(score.clamp(0.0, 1.0));
        self
    }

    /// Number the sequence and derive stable ids from position and content.
    pub fn assign_identity(segments: &mut [Segment]) {
        for (index, segment) in segments.iter_mut().enumerate() {
            segment.index = index;
            let key = format!(
                "{}:{}:{}:{}",
                index, segment.span.start, segment.span.end, segment.content
            );
            segment.id = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes());
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

//! Greedy, distance-driven boundary placement over sentences.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::similarity::{cosine_distance, percentile};
use crate::chunkers::{
    absorb_undersized, spans_to_segments, RawSpan, SentenceSplitter, SeparatorSplitter,
    TokenEstimator,
};
use crate::embedding::{embed_all, EmbeddingProvider};
use crate::error::EmbeddingError;
use crate::types::{BoundaryKind, Segment, SegmentationConfig, Span};

/// Segments produced by semantic placement and the threshold that drove it.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub segments: Vec<Segment>,
    pub threshold: f32,
}

/// Places cuts where consecutive sentences drift apart.
///
/// Sentences are accumulated until the next one would break the token
/// budget, or until the distance to the next sentence exceeds the threshold
/// and the buffer already meets the minimum size. A single sentence larger
/// than the budget is handed to the separator splitter.
pub struct SemanticPlacer {
    estimator: Arc<dyn TokenEstimator>,
    splitter: SeparatorSplitter,
    sentences: SentenceSplitter,
}

impl SemanticPlacer {
    pub fn new(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self {
            splitter: SeparatorSplitter::new(estimator.clone()),
            sentences: SentenceSplitter::new(),
            estimator,
        }
    }

    /// Segment normalized `text` along semantic boundaries.
    pub async fn place(
        &self,
        text: &str,
        provider: &dyn EmbeddingProvider,
        config: &SegmentationConfig,
    ) -> Result<Placement, EmbeddingError> {
        let sentences = self.sentences.split(text);
        if sentences.is_empty() {
            return Ok(Placement {
                segments: vec![],
                threshold: 0.0,
            });
        }

        let sentence_texts: Vec<&str> = sentences.iter().map(|s| s.slice(text).trim()).collect();
        let vectors = embed_all(
            provider,
            &sentence_texts,
            config.embedding_batch_size,
            Duration::from_millis(config.embedding_timeout_ms),
        )
        .await?;

        let distances = vectors
            .windows(2)
            .map(|pair| cosine_distance(&pair[0], &pair[1]))
            .collect::<Result<Vec<_>, _>>()?;

        let threshold = match config.semantic_threshold {
            Some(threshold) => threshold,
            None => percentile(&distances, config.threshold_percentile).unwrap_or(0.0),
        };

        let mut spans = self.accumulate(text, &sentences, &distances, threshold, config);
        absorb_undersized(
            text,
            &mut spans,
            self.estimator.as_ref(),
            config.min_chunk_size,
            config.budget(),
        );

        let segments = spans_to_segments(text, &spans, self.estimator.as_ref(), config.budget())
            .into_iter()
            .map(|segment| {
                let score = coherence(&segment.span, &sentences, &distances);
                segment.with_score(score)
            })
            .collect::<Vec<_>>();

        debug!(
            sentences = sentences.len(),
            segments = segments.len(),
            threshold,
            "Semantic placement complete"
        );

        Ok(Placement {
            segments,
            threshold,
        })
    }

    fn accumulate(
        &self,
        text: &str,
        sentences: &[Span],
        distances: &[f32],
        threshold: f32,
        config: &SegmentationConfig,
    ) -> Vec<RawSpan> {
        let budget = config.budget();
        let mut spans: Vec<RawSpan> = Vec::new();
        let mut buffer: Option<Span> = None;

        for (i, sentence) in sentences.iter().enumerate() {
            if self.estimator.estimate(sentence.slice(text)) > budget {
                if let Some(current) = buffer.take() {
                    spans.push(RawSpan::new(current.start, current.end, BoundaryKind::Sentence));
                }
                spans.extend(self.splitter.split_range(text, sentence.start, sentence.end, config));
                continue;
            }

            buffer = Some(match buffer {
                None => *sentence,
                Some(current) => {
                    let candidate = current.union(sentence);
                    if self.estimator.estimate(candidate.slice(text)) > budget {
                        spans.push(RawSpan::new(
                            current.start,
                            current.end,
                            BoundaryKind::Sentence,
                        ));
                        *sentence
                    } else if distances[i - 1] > threshold
                        && self.estimator.estimate(current.slice(text))
                            >= config.min_chunk_size
                    {
                        spans.push(RawSpan::new(
                            current.start,
                            current.end,
                            BoundaryKind::Semantic,
                        ));
                        *sentence
                    } else {
                        candidate
                    }
                }
            });
        }

        if let Some(current) = buffer {
            spans.push(RawSpan::new(current.start, current.end, BoundaryKind::Paragraph));
        }
        spans
    }
}

/// Mean similarity of consecutive sentences wholly inside `span`.
fn coherence(span: &Span, sentences: &[Span], distances: &[f32]) -> f32 {
    let similarities: Vec<f32> = sentences
        .windows(2)
        .zip(distances)
        .filter(|(pair, _)| pair[0].start >= span.start && pair[1].end <= span.end)
        .map(|(_, distance)| 1.0 - distance)
        .collect();

    if similarities.is_empty() {
        1.0
    } else {
        similarities.iter().sum::<f32>() / similarities.len() as f32
    }
}

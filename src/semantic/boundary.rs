//! Boundary-distance analysis between adjacent segments.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use super::similarity::{cosine_distance, cosine_similarity, percentile};
use crate::chunkers::SentenceSplitter;
use crate::embedding::{embed_all, EmbeddingProvider};
use crate::error::EmbeddingError;
use crate::types::{Segment, SegmentationConfig};

/// Distances across every cut point plus the threshold to judge them by.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundaryAnalysis {
    /// `distances[i]` is the distance between segment `i` and `i + 1`
    pub distances: Vec<f32>,
    /// Configured threshold, or the percentile of `distances`
    pub threshold: f32,
    /// Per-segment similarity of its first and last sentence, in `[0, 1]`
    pub coherence: Vec<f32>,
}

impl BoundaryAnalysis {
    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

/// Embeds the sentences on each side of every cut and measures how far
/// apart they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryAnalyzer {
    sentences: SentenceSplitter,
}

impl BoundaryAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze the cut points of `segments`.
    ///
    /// Returns an empty analysis for fewer than two segments without calling
    /// the provider.
    pub async fn analyze(
        &self,
        segments: &[Segment],
        provider: &dyn EmbeddingProvider,
        config: &SegmentationConfig,
    ) -> Result<BoundaryAnalysis, EmbeddingError> {
        if segments.len() < 2 {
            return Ok(BoundaryAnalysis::default());
        }

        // Each distinct edge sentence is embedded once.
        let mut unique: Vec<&str> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut edges: Vec<(usize, usize)> = Vec::with_capacity(segments.len());

        for segment in segments {
            let (first, last) = self.sentences.edges(&segment.content);
            let mut position = |text| {
                *positions.entry(text).or_insert_with(|| {
                    unique.push(text);
                    unique.len() - 1
                })
            };
            edges.push((position(first), position(last)));
        }

        let vectors = embed_all(
            provider,
            &unique,
            config.embedding_batch_size,
            Duration::from_millis(config.embedding_timeout_ms),
        )
        .await?;

        let distances = edges
            .windows(2)
            .map(|pair| cosine_distance(&vectors[pair[0].1], &vectors[pair[1].0]))
            .collect::<Result<Vec<_>, _>>()?;

        let coherence = edges
            .iter()
            .map(|(first, last)| {
                cosine_similarity(&vectors[*first], &vectors[*last]).map(|s| s.clamp(0.0, 1.0))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let threshold = match config.semantic_threshold {
            Some(threshold) => threshold,
            None => percentile(&distances, config.threshold_percentile).unwrap_or(0.0),
        };

        debug!(
            boundaries = distances.len(),
            embedded = unique.len(),
            threshold,
            "Boundary analysis complete"
        );

        Ok(BoundaryAnalysis {
            distances,
            threshold,
            coherence,
        })
    }
}

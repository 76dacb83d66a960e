//! Merge decisions over analyzed cut points.

use std::sync::Arc;

use tracing::debug;

use super::boundary::BoundaryAnalysis;
use crate::chunkers::TokenEstimator;
use crate::types::Segment;

/// Score assumed for a segment that carries none.
const NEUTRAL_SCORE: f32 = 0.5;

/// Recombines adjacent segments whose cut point scored above the threshold.
///
/// A pair is merged when its distance is strictly greater than the
/// threshold, the joined content fits the budget, and neither side exceeds
/// `merge_size_ratio` of the budget. Only one extra neighbour is absorbed per
/// resulting segment in a single pass.
pub struct MergeEngine {
    estimator: Arc<dyn TokenEstimator>,
}

impl MergeEngine {
    pub fn new(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self { estimator }
    }

    /// Merge `segments` (pre-overlap) according to `analysis`.
    ///
    /// Returns the new sequence and the number of merges applied.
    pub fn apply(
        &self,
        segments: Vec<Segment>,
        analysis: &BoundaryAnalysis,
        budget: usize,
        size_ratio: f32,
    ) -> (Vec<Segment>, usize) {
        if analysis.is_empty() || segments.len() < 2 {
            return (segments, 0);
        }

        let side_limit = (budget as f32 * size_ratio).floor() as usize;
        let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
        let mut merges = 0;
        let mut iter = segments.into_iter().enumerate().peekable();

        while let Some((i, left)) = iter.next() {
            let distance = analysis.distances.get(i).copied();
            let candidate = match iter.peek() {
                Some((_, right))
                    if should_merge(&left, right, distance, analysis.threshold, side_limit) =>
                {
                    let joined = join(&left.content, &right.content);
                    let token_count = self.estimator.estimate(&joined);
                    (token_count <= budget).then_some((joined, token_count))
                }
                _ => None,
            };

            match candidate {
                Some((content, token_count)) => {
                    if let Some((_, right)) = iter.next() {
                        merged.push(combine(left, right, content, token_count));
                        merges += 1;
                    }
                }
                None => merged.push(left),
            }
        }

        debug!(
            before = merged.len() + merges,
            after = merged.len(),
            merges,
            "Merge pass complete"
        );
        (merged, merges)
    }
}

fn should_merge(
    left: &Segment,
    right: &Segment,
    distance: Option<f32>,
    threshold: f32,
    side_limit: usize,
) -> bool {
    match distance {
        Some(distance) => {
            distance > threshold
                && left.token_count <= side_limit
                && right.token_count <= side_limit
        }
        None => false,
    }
}

fn join(left: &str, right: &str) -> String {
    format!("{} {}", left.trim_end(), right.trim_start())
}

fn combine(left: Segment, right: Segment, content: String, token_count: usize) -> Segment {
    let left_score = left.semantic_score.unwrap_or(NEUTRAL_SCORE);
    let right_score = right.semantic_score.unwrap_or(NEUTRAL_SCORE);
    let weight = left.token_count + right.token_count;
    let score = if weight == 0 {
        (left_score + right_score) / 2.0
    } else {
        (left_score * left.token_count as f32 + right_score * right.token_count as f32)
            / weight as f32
    };

    Segment {
        content,
        span: left.span.union(&right.span),
        token_count,
        boundary_kind: right.boundary_kind,
        oversized: false,
        ..left
    }
    .with_score(score)
}

//! Cross-segment overlap injection.

use std::sync::Arc;

use tracing::debug;

use super::base::TokenEstimator;
use crate::types::Segment;

/// Prepends a tail of each segment's predecessor to preserve continuity.
///
/// The tail is taken from the predecessor's pre-overlap content and sized to
/// `ceil(prev_tokens * pct / 100)` tokens, converted to whole words. It is
/// shortened word by word until the segment fits the token budget. Spans are
/// never touched.
pub struct OverlapInjector {
    estimator: Arc<dyn TokenEstimator>,
}

impl OverlapInjector {
    pub fn new(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self { estimator }
    }

    /// Apply `percentage` overlap to `segments`.
    ///
    /// Returns the input unchanged when `percentage` is 0 or there is at most
    /// one segment.
    pub fn apply(
        &self,
        mut segments: Vec<Segment>,
        percentage: u32,
        budget: usize,
    ) -> Vec<Segment> {
        if percentage == 0 || segments.len() < 2 {
            return segments;
        }

        let originals: Vec<(String, usize)> = segments
            .iter()
            .map(|s| (s.content.clone(), s.token_count))
            .collect();

        let mut injected = 0;
        for i in 1..segments.len() {
            let (previous, previous_tokens) = &originals[i - 1];
            let words: Vec<&str> = previous.split_whitespace().collect();
            if words.is_empty() || *previous_tokens == 0 {
                continue;
            }

            let overlap_tokens = (previous_tokens * percentage as usize).div_ceil(100);
            let wanted_words = (overlap_tokens * words.len())
                .div_ceil(*previous_tokens)
                .clamp(1, words.len());

            for take in (1..=wanted_words).rev() {
                let tail = words[words.len() - take..].join(" ");
                let content = format!("{} {}", tail, segments[i].content);
                let token_count = self.estimator.estimate(&content);
                if token_count <= budget {
                    let tail_tokens = self.estimator.estimate(&tail);
                    segments[i].content = content;
                    segments[i].token_count = token_count;
                    segments[i].overlap_prefix_tokens = tail_tokens;
                    segments[i - 1].overlap_suffix_tokens = tail_tokens;
                    injected += 1;
                    break;
                }
            }
        }

        debug!(segments = segments.len(), injected, percentage, "Overlap applied");
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunkers::base::HeuristicEstimator;
    use crate::types::{BoundaryKind, Span};

    fn injector() -> OverlapInjector {
        OverlapInjector::new(Arc::new(HeuristicEstimator))
    }

    fn segments(text: &str, cuts: &[usize]) -> Vec<Segment> {
        let mut bounds = vec![0];
        bounds.extend_from_slice(cuts);
        bounds.push(text.len());
        bounds
            .windows(2)
            .map(|w| {
                let span = Span::new(w[0], w[1]);
                let tokens = HeuristicEstimator.estimate(span.slice(text));
                Segment::from_span(text, span, tokens, BoundaryKind::Sentence)
            })
            .collect()
    }

    const TEXT: &str = "one two three four five six seven eight nine ten. \
                        eleven twelve thirteen fourteen fifteen \
                        sixteen seventeen eighteen nineteen twenty.";

    #[test]
    fn test_zero_percent_is_identity() {
        let input = segments(TEXT, &[50]);
        let output = injector().apply(input.clone(), 0, 500);
        assert_eq!(output, input);
    }

    #[test]
    fn test_single_segment_is_identity() {
        let input = segments(TEXT, &[]);
        let output = injector().apply(input.clone(), 30, 500);
        assert_eq!(output, input);
    }

    #[test]
    fn test_prefix_comes_from_previous_tail() {
        let input = segments(TEXT, &[50]);
        let output = injector().apply(input.clone(), 20, 500);

        assert!(output[1].content.starts_with("eight nine ten. eleven"));
        assert!(output[1].overlap_prefix_tokens > 0);
        assert_eq!(output[0].overlap_suffix_tokens, output[1].overlap_prefix_tokens);
        assert!(output[1].token_count > input[1].token_count);
        assert_eq!(output[1].span, input[1].span);
        assert_eq!(
            output[0],
            Segment {
                overlap_suffix_tokens: output[0].overlap_suffix_tokens,
                ..input[0].clone()
            }
        );
    }

    #[test]
    fn test_prefix_shrinks_to_fit_budget() {
        let input = segments(TEXT, &[50]);
        let budget = input[1].token_count + 2;
        let output = injector().apply(input, 30, budget);
        assert!(output[1].token_count <= budget);
    }

    #[test]
    fn test_monotonic_in_percentage() {
        let input = segments(TEXT, &[19, 50, 90]);
        let mut previous: Option<Vec<Segment>> = None;
        for percentage in [0, 5, 10, 20, 30] {
            let output = injector().apply(input.clone(), percentage, 500);
            if let Some(previous) = &previous {
                for (before, after) in previous.iter().zip(&output) {
                    assert!(after.token_count >= before.token_count);
                }
            }
            previous = Some(output);
        }
    }
}

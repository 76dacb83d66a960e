//! Run results and diagnostics.

use serde::{Deserialize, Serialize};

use super::Segment;

/// Why hybrid refinement was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum Fallback {
    /// No embedding provider is configured
    NoProvider,
    /// The provider failed or timed out
    ProviderError(String),
}

/// Side information about a run; never affects the produced segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Name of the strategy that ran
    pub strategy: String,

    /// Token estimate of the normalized input
    pub input_tokens: usize,

    /// Boundary-distance threshold used, if any embeddings were computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,

    /// Adjacent pairs recombined by the merge engine
    pub merges_applied: usize,

    /// Segments holding a single unit larger than the budget
    pub oversized_segments: usize,

    /// Set when hybrid refinement was skipped and the syntactic result returned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Fallback>,
}

/// Segments plus diagnostics for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentationOutcome {
    pub segments: Vec<Segment>,
    pub diagnostics: Diagnostics,
}

impl SegmentationOutcome {
    /// Total tokens across all segments, overlap included.
    pub fn total_tokens(&self) -> usize {
        self.segments.iter().map(|s| s.token_count).sum()
    }

    /// True when hybrid refinement was skipped.
    pub fn fell_back(&self) -> bool {
        self.diagnostics.fallback.is_some()
    }
}

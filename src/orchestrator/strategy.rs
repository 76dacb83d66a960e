//! Strategy selection.

use serde::{Deserialize, Serialize};

use crate::types::{SegmentationMode, Tier};

/// The pipeline a run executes, chosen once from caller flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Strategy {
    /// Separator splitting followed by overlap
    Syntactic,
    /// Sentence embeddings and greedy distance-driven placement
    Semantic,
    /// Syntactic split, optionally refined by boundary analysis and merging
    Hybrid { refine: bool },
}

impl Strategy {
    /// Pick the strategy for a caller.
    ///
    /// Standard tier always gets the syntactic pipeline; premium callers get
    /// the mode they asked for.
    pub fn select(tier: Tier, mode: SegmentationMode, refine: bool) -> Self {
        match (tier, mode) {
            (Tier::Standard, _) => Strategy::Syntactic,
            (Tier::Premium, SegmentationMode::Syntactic) => Strategy::Syntactic,
            (Tier::Premium, SegmentationMode::Semantic) => Strategy::Semantic,
            (Tier::Premium, SegmentationMode::Hybrid) => Strategy::Hybrid { refine },
        }
    }

    /// Get the name of this strategy.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Syntactic => "syntactic",
            Strategy::Semantic => "semantic",
            Strategy::Hybrid { .. } => "hybrid",
        }
    }

    /// Get a description of this strategy.
    pub fn description(&self) -> &'static str {
        match self {
            Strategy::Syntactic => "Splits on a separator hierarchy within the token budget",
            Strategy::Semantic => "Places boundaries where consecutive sentences diverge",
            Strategy::Hybrid { refine: true } => {
                "Separator splitting, then merges cuts with poor boundary distance"
            }
            Strategy::Hybrid { refine: false } => "Separator splitting with refinement disabled",
        }
    }

    /// Whether the strategy needs an embedding provider to run as requested.
    pub fn uses_embeddings(&self) -> bool {
        matches!(self, Strategy::Semantic | Strategy::Hybrid { refine: true })
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

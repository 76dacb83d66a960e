//! Embedding-driven analysis: boundary distances, merging and placement.

mod boundary;
mod merge;
mod placement;
mod similarity;

pub use boundary::{BoundaryAnalysis, BoundaryAnalyzer};
pub use merge::MergeEngine;
pub use placement::{Placement, SemanticPlacer};
pub use similarity::{cosine_distance, cosine_similarity, percentile};

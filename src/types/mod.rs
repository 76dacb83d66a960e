//! Core types for the segmentation engine.

mod config;
mod outcome;
mod segment;

pub use config::{
    default_separators, markdown_separators, EngineSettings, SegmentationConfig,
    SegmentationMode, Tier, MAX_TOKENS_RANGE, OVERLAP_PERCENTAGE_RANGE,
};
pub use outcome::{Diagnostics, Fallback, SegmentationOutcome};
pub use segment::{BoundaryKind, Segment, Span};

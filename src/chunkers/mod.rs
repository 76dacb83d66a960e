//! Syntactic building blocks: estimation, normalization, splitting and overlap.

mod base;
mod normalizer;
mod overlap;
mod recursive_chunker;
mod sentence_chunker;

pub use base::{estimate_tokens, HeuristicEstimator, TiktokenEstimator, TokenEstimator};
pub use normalizer::TextNormalizer;
pub use overlap::OverlapInjector;
pub use recursive_chunker::SeparatorSplitter;
pub use sentence_chunker::SentenceSplitter;

pub(crate) use base::{absorb_undersized, spans_to_segments, RawSpan};

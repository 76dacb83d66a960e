//! Hybrid Chunker Library
//!
//! Splits long text into token-bounded segments for downstream model calls.
//! Three strategies are available: separator-hierarchy splitting, semantic
//! placement driven by sentence embeddings, and a hybrid that refines
//! syntactic cuts by re-merging pairs with poor boundary distance.
//!
//! ```no_run
//! use hybrid_chunker::prelude::*;
//!
//! # async fn run() -> hybrid_chunker::Result<()> {
//! let engine = ChunkingEngine::new();
//! let config = SegmentationConfig::with_max_tokens(200);
//! let segments = engine
//!     .segment("Some long text...", &config, SegmentationMode::Syntactic)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod chunkers;
pub mod embedding;
pub mod error;
pub mod orchestrator;
pub mod semantic;
pub mod types;

pub use batch::{BatchConfig, BatchResult, BatchSegmenter, Document, DocumentSegments};
pub use chunkers::{HeuristicEstimator, TiktokenEstimator, TokenEstimator};
pub use embedding::{CachedEmbeddingProvider, EmbeddingProvider, HashingEmbeddingProvider};
pub use error::{ChunkingError, EmbeddingError, Result};
pub use orchestrator::{ChunkingEngine, Strategy};
pub use types::{
    Diagnostics, Fallback, Segment, SegmentationConfig, SegmentationMode, SegmentationOutcome,
    Tier,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::batch::*;
    pub use crate::chunkers::{HeuristicEstimator, TokenEstimator};
    pub use crate::embedding::{EmbeddingProvider, HashingEmbeddingProvider};
    pub use crate::error::{ChunkingError, EmbeddingError};
    pub use crate::orchestrator::{ChunkingEngine, Strategy};
    pub use crate::types::*;
}

/// Default token budget per segment
pub const DEFAULT_MAX_TOKENS: usize = 500;

/// Default minimum segment size in tokens
pub const DEFAULT_MIN_CHUNK_SIZE: usize = 50;

/// Default hard upper bound on segment size in tokens
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 2000;

/// Default overlap as a percentage of the previous segment
pub const DEFAULT_OVERLAP_PERCENTAGE: u32 = 10;

/// Default percentile of boundary distances used as the merge threshold
pub const DEFAULT_THRESHOLD_PERCENTILE: f32 = 95.0;

/// Default share of the budget either side of a merge may use
pub const DEFAULT_MERGE_SIZE_RATIO: f32 = 0.8;

/// Default number of concurrent embedding requests
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 10;

/// Default per-request embedding timeout
pub const DEFAULT_EMBEDDING_TIMEOUT_MS: u64 = 10_000;

/// Maximum document size accepted by the batch segmenter (10MB)
pub const DEFAULT_MAX_CONTENT_SIZE: usize = 10 * 1024 * 1024;

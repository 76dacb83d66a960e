//! Error types for the segmentation engine.

use thiserror::Error;

/// Errors raised at the embedding provider boundary.
///
/// Every variant is recoverable for the hybrid strategy (it falls back to the
/// syntactic result) and fatal for the pure semantic strategy.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Two vectors of different length were compared.
    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// A provider returned, or a caller compared, a zero-length vector.
    #[error("embedding vector is empty")]
    EmptyVector,

    /// A vector contained NaN or infinite components.
    #[error("embedding vector contains non-finite values")]
    NonFinite,

    /// The provider did not answer within the configured timeout.
    #[error("embedding request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Any failure reported by the provider back-end itself.
    #[error("embedding provider failed: {0:#}")]
    Provider(anyhow::Error),
}

/// Errors returned by [`ChunkingEngine`](crate::ChunkingEngine) and friends.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Configuration rejected before any processing started.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The semantic strategy was requested without an embedding provider.
    #[error("semantic segmentation requires an embedding provider")]
    MissingProvider,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Input rejected by the batch segmenter's size guard.
    #[error("content too large: {size} bytes (limit {limit})")]
    ContentTooLarge { size: usize, limit: usize },

    /// Settings could not be loaded from file or environment.
    #[error("failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, ChunkingError>;

//! Configuration types for segmentation.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ChunkingError, Result};
use crate::{
    DEFAULT_EMBEDDING_BATCH_SIZE, DEFAULT_EMBEDDING_TIMEOUT_MS, DEFAULT_MAX_CHUNK_SIZE,
    DEFAULT_MAX_TOKENS, DEFAULT_MERGE_SIZE_RATIO, DEFAULT_MIN_CHUNK_SIZE,
    DEFAULT_OVERLAP_PERCENTAGE, DEFAULT_THRESHOLD_PERCENTILE,
};

/// Accepted range for `max_tokens`; values outside are clamped.
pub const MAX_TOKENS_RANGE: (usize, usize) = (10, 2000);

/// Accepted range for a non-zero `overlap_percentage`; values outside are clamped.
pub const OVERLAP_PERCENTAGE_RANGE: (u32, u32) = (5, 30);

/// Separators tried from most to least structurally significant.
pub fn default_separators() -> Vec<String> {
    ["\n\n\n", "\n\n", "\n", ". ", "! ", "? ", " "]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Separators for markdown input: section breaks and headings come first.
pub fn markdown_separators() -> Vec<String> {
    ["\n\n\n", "\n# ", "\n## ", "\n### ", "\n\n", "\n", ". ", "! ", "? ", " "]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Caller subscription tier; gates which strategies are reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Syntactic segmentation only
    Standard,
    /// All strategies
    #[default]
    Premium,
}

/// Requested segmentation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    Syntactic,
    Semantic,
    Hybrid,
}

impl std::fmt::Display for SegmentationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentationMode::Syntactic => write!(f, "syntactic"),
            SegmentationMode::Semantic => write!(f, "semantic"),
            SegmentationMode::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Configuration for a single segmentation run.
///
/// Immutable for the duration of a run. Use [`SegmentationConfig::validated`]
/// to obtain the clamped copy the engine actually runs with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Token budget per segment
    pub max_tokens: usize,

    /// Minimum tokens per segment, unless the whole input is smaller or a
    /// fragment has no neighbour with room (see [`Segment`](super::Segment))
    pub min_chunk_size: usize,

    /// Hard upper bound; the effective budget is `min(max_tokens, max_chunk_size)`
    pub max_chunk_size: usize,

    /// Share of the previous segment duplicated into the next, 0 disables
    pub overlap_percentage: u32,

    /// Ordered separator hierarchy; an empty string means "split anywhere"
    pub separators: Vec<String>,

    /// Fixed boundary-distance threshold; computed from a percentile when absent
    pub semantic_threshold: Option<f32>,

    /// Percentile of observed distances used when no threshold is given
    pub threshold_percentile: f32,

    /// Neither side of a merge may exceed this share of the budget
    pub merge_size_ratio: f32,

    /// Concurrent embedding requests per batch
    pub embedding_batch_size: usize,

    /// Timeout for a single embedding request
    pub embedding_timeout_ms: u64,

    /// Run boundary analysis and merging after syntactic splitting in hybrid mode
    pub enable_semantic_refinement: bool,

    /// Caller tier
    pub tier: Tier,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            overlap_percentage: DEFAULT_OVERLAP_PERCENTAGE,
            separators: default_separators(),
            semantic_threshold: None,
            threshold_percentile: DEFAULT_THRESHOLD_PERCENTILE,
            merge_size_ratio: DEFAULT_MERGE_SIZE_RATIO,
            embedding_batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
            embedding_timeout_ms: DEFAULT_EMBEDDING_TIMEOUT_MS,
            enable_semantic_refinement: true,
            tier: Tier::Premium,
        }
    }
}

impl SegmentationConfig {
    /// Create a config with the given token budget.
    pub fn with_max_tokens(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            ..Default::default()
        }
    }

    /// Set the minimum segment size.
    pub fn with_min_chunk_size(mut self, min_chunk_size: usize) -> Self {
        self.min_chunk_size = min_chunk_size;
        self
    }

    /// Set the overlap percentage.
    pub fn with_overlap(mut self, overlap_percentage: u32) -> Self {
        self.overlap_percentage = overlap_percentage;
        self
    }

    /// Replace the separator hierarchy.
    pub fn with_separators<S: AsRef<str>>(mut self, separators: &[S]) -> Self {
        self.separators = separators.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    /// Fix the boundary-distance threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.semantic_threshold = Some(threshold);
        self
    }

    /// Set the caller tier.
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    /// Enable or disable hybrid refinement.
    pub fn with_refinement(mut self, enabled: bool) -> Self {
        self.enable_semantic_refinement = enabled;
        self
    }

    /// Set the per-request embedding timeout.
    pub fn with_embedding_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.embedding_timeout_ms = timeout_ms;
        self
    }

    /// Effective per-segment token budget.
    pub fn budget(&self) -> usize {
        self.max_tokens.min(self.max_chunk_size)
    }

    /// Look up a named preset.
    pub fn preset(name: &str) -> Option<Self> {
        let config = match name.to_lowercase().as_str() {
            "default" => Self::default(),
            "small" => Self {
                max_tokens: 250,
                min_chunk_size: 25,
                ..Default::default()
            },
            "large" => Self {
                max_tokens: 1000,
                min_chunk_size: 100,
                ..Default::default()
            },
            "markdown" => Self {
                separators: markdown_separators(),
                ..Default::default()
            },
            _ => return None,
        };
        Some(config)
    }

    /// Check the configuration and return the clamped copy to run with.
    ///
    /// Out-of-range `max_tokens` and `overlap_percentage` are clamped;
    /// contradictory settings are rejected.
    pub fn validated(&self) -> Result<Self> {
        let mut config = self.clone();

        let (min_tokens, max_tokens) = MAX_TOKENS_RANGE;
        let clamped = config.max_tokens.clamp(min_tokens, max_tokens);
        if clamped != config.max_tokens {
            warn!(requested = config.max_tokens, clamped, "max_tokens out of range, clamping");
            config.max_tokens = clamped;
        }

        if config.overlap_percentage > 0 {
            let (low, high) = OVERLAP_PERCENTAGE_RANGE;
            let clamped = config.overlap_percentage.clamp(low, high);
            if clamped != config.overlap_percentage {
                warn!(
                    requested = config.overlap_percentage,
                    clamped, "overlap_percentage out of range, clamping"
                );
                config.overlap_percentage = clamped;
            }
        }

        if config.max_chunk_size == 0 {
            return Err(invalid("max_chunk_size must be greater than 0"));
        }
        if config.min_chunk_size > config.max_chunk_size {
            return Err(invalid(format!(
                "min_chunk_size {} exceeds max_chunk_size {}",
                config.min_chunk_size, config.max_chunk_size
            )));
        }
        if config.min_chunk_size > config.budget() {
            return Err(invalid(format!(
                "min_chunk_size {} exceeds token budget {}",
                config.min_chunk_size,
                config.budget()
            )));
        }
        if config.separators.is_empty() {
            return Err(invalid("separator list is empty"));
        }
        if let Some(threshold) = config.semantic_threshold {
            if !(0.0..=2.0).contains(&threshold) {
                return Err(invalid(format!(
                    "semantic_threshold {threshold} outside [0, 2]"
                )));
            }
        }
        if !(config.threshold_percentile > 0.0 && config.threshold_percentile <= 100.0) {
            return Err(invalid(format!(
                "threshold_percentile {} outside (0, 100]",
                config.threshold_percentile
            )));
        }
        if !(config.merge_size_ratio > 0.0 && config.merge_size_ratio <= 1.0) {
            return Err(invalid(format!(
                "merge_size_ratio {} outside (0, 1]",
                config.merge_size_ratio
            )));
        }
        if config.embedding_batch_size == 0 {
            return Err(invalid("embedding_batch_size must be greater than 0"));
        }

        Ok(config)
    }
}

fn invalid(message: impl Into<String>) -> ChunkingError {
    ChunkingError::InvalidConfig(message.into())
}

/// Process-wide engine defaults.
///
/// Loaded from an optional settings file and `CHUNKER_`-prefixed environment
/// variables, falling back to the crate defaults for anything unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub max_tokens: usize,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub overlap_percentage: u32,
    pub semantic_threshold: Option<f32>,
    pub threshold_percentile: f32,
    pub merge_size_ratio: f32,
    pub embedding_batch_size: usize,
    pub embedding_timeout_ms: u64,
    pub enable_semantic_refinement: bool,
    pub tier: Tier,
    /// Named preset supplying the separator hierarchy
    pub profile: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let config = SegmentationConfig::default();
        Self {
            max_tokens: config.max_tokens,
            min_chunk_size: config.min_chunk_size,
            max_chunk_size: config.max_chunk_size,
            overlap_percentage: config.overlap_percentage,
            semantic_threshold: config.semantic_threshold,
            threshold_percentile: config.threshold_percentile,
            merge_size_ratio: config.merge_size_ratio,
            embedding_batch_size: config.embedding_batch_size,
            embedding_timeout_ms: config.embedding_timeout_ms,
            enable_semantic_refinement: config.enable_semantic_refinement,
            tier: config.tier,
            profile: "default".to_string(),
        }
    }
}

impl EngineSettings {
    /// Load settings from environment variables only.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load settings from an optional file, then environment variables.
    ///
    /// Later sources override earlier ones. A `.env` file in the working
    /// directory is honoured if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("CHUNKER").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Build the per-run configuration these settings describe.
    pub fn segmentation_config(&self) -> SegmentationConfig {
        let base = SegmentationConfig::preset(&self.profile).unwrap_or_else(|| {
            warn!(profile = %self.profile, "Unknown profile, using default separators");
            SegmentationConfig::default()
        });

        SegmentationConfig {
            max_tokens: self.max_tokens,
            min_chunk_size: self.min_chunk_size,
            max_chunk_size: self.max_chunk_size,
            overlap_percentage: self.overlap_percentage,
            separators: base.separators,
            semantic_threshold: self.semantic_threshold,
            threshold_percentile: self.threshold_percentile,
            merge_size_ratio: self.merge_size_ratio,
            embedding_batch_size: self.embedding_batch_size,
            embedding_timeout_ms: self.embedding_timeout_ms,
            enable_semantic_refinement: self.enable_semantic_refinement,
            tier: self.tier,
        }
    }
}

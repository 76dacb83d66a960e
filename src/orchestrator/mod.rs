//! Segmentation entry point.
//!
//! [`ChunkingEngine`] validates the configuration, normalizes the input and
//! dispatches to one [`Strategy`]. Hybrid refinement failures degrade to the
//! syntactic result and are reported through [`Diagnostics::fallback`].

mod strategy;

use std::sync::Arc;

use tracing::{debug, info, warn};

pub use strategy::Strategy;

use crate::chunkers::{
    HeuristicEstimator, OverlapInjector, SeparatorSplitter, TextNormalizer, TokenEstimator,
};
use crate::embedding::{CachedEmbeddingProvider, EmbeddingProvider};
use crate::error::{ChunkingError, Result};
use crate::semantic::{BoundaryAnalyzer, MergeEngine, SemanticPlacer};
use crate::types::{
    BoundaryKind, Diagnostics, Fallback, Segment, SegmentationConfig, SegmentationMode,
    SegmentationOutcome, Span,
};

/// Splits text into bounded, coherent segments.
///
/// The engine is stateless between runs apart from whatever its embedding
/// provider caches, so one instance can be shared behind an `Arc`.
pub struct ChunkingEngine {
    estimator: Arc<dyn TokenEstimator>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    normalizer: TextNormalizer,
    splitter: SeparatorSplitter,
    overlap: OverlapInjector,
    analyzer: BoundaryAnalyzer,
    merger: MergeEngine,
    placer: SemanticPlacer,
}

impl Default for ChunkingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkingEngine {
    /// Create an engine with the heuristic estimator and no embedding provider.
    pub fn new() -> Self {
        Self::build(Arc::new(HeuristicEstimator), None)
    }

    fn build(
        estimator: Arc<dyn TokenEstimator>,
        provider: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        Self {
            normalizer: TextNormalizer::new(),
            splitter: SeparatorSplitter::new(estimator.clone()),
            overlap: OverlapInjector::new(estimator.clone()),
            analyzer: BoundaryAnalyzer::new(),
            merger: MergeEngine::new(estimator.clone()),
            placer: SemanticPlacer::new(estimator.clone()),
            estimator,
            provider,
        }
    }

    /// Use a different token estimator.
    pub fn with_estimator(self, estimator: Arc<dyn TokenEstimator>) -> Self {
        Self::build(estimator, self.provider)
    }

    /// Attach an embedding provider.
    pub fn with_provider(self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::build(self.estimator, Some(provider))
    }

    /// Attach an embedding provider behind a read-through cache.
    pub fn with_cached_provider(self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.with_provider(Arc::new(CachedEmbeddingProvider::new(provider)))
    }

    /// Get the configured token estimator.
    pub fn estimator(&self) -> &dyn TokenEstimator {
        self.estimator.as_ref()
    }

    /// Get the configured embedding provider, if any.
    pub fn provider(&self) -> Option<&Arc<dyn EmbeddingProvider>> {
        self.provider.as_ref()
    }

    /// Segment `text`, returning only the segments.
    pub async fn segment(
        &self,
        text: &str,
        config: &SegmentationConfig,
        mode: SegmentationMode,
    ) -> Result<Vec<Segment>> {
        self.segment_with_report(text, config, mode)
            .await
            .map(|outcome| outcome.segments)
    }

    /// Segment `text` and report how the run went.
    pub async fn segment_with_report(
        &self,
        text: &str,
        config: &SegmentationConfig,
        mode: SegmentationMode,
    ) -> Result<SegmentationOutcome> {
        let config = config.validated()?;
        let strategy = Strategy::select(config.tier, mode, config.enable_semantic_refinement);
        let budget = config.budget();

        let normalized = self.normalizer.normalize(text);
        let input_tokens = self.estimator.estimate(&normalized);
        let mut diagnostics = Diagnostics {
            strategy: strategy.name().to_string(),
            input_tokens,
            ..Default::default()
        };

        info!(
            strategy = %strategy,
            description = strategy.description(),
            %mode,
            estimator = self.estimator.name(),
            input_tokens,
            budget,
            "Starting segmentation"
        );

        if normalized.is_empty() {
            debug!("Empty input after normalization");
            return Ok(SegmentationOutcome {
                segments: vec![],
                diagnostics,
            });
        }

        let mut segments = if input_tokens <= budget {
            debug!(input_tokens, budget, "Input fits the budget, emitting one segment");
            vec![Segment::from_span(
                &normalized,
                Span::new(0, normalized.len()),
                input_tokens,
                BoundaryKind::Paragraph,
            )]
        } else {
            match strategy {
                Strategy::Syntactic => self.run_syntactic(&normalized, &config),
                Strategy::Semantic => {
                    self.run_semantic(&normalized, &config, &mut diagnostics)
                        .await?
                }
                Strategy::Hybrid { refine } => {
                    self.run_hybrid(&normalized, &config, refine, &mut diagnostics)
                        .await
                }
            }
        };

        Segment::assign_identity(&mut segments);
        check_invariants(&normalized, &segments, budget);

        diagnostics.oversized_segments = segments.iter().filter(|s| s.oversized).count();
        let outcome = SegmentationOutcome {
            segments,
            diagnostics,
        };

        info!(
            strategy = %strategy,
            segments = outcome.segments.len(),
            total_tokens = outcome.total_tokens(),
            merges = outcome.diagnostics.merges_applied,
            fell_back = outcome.fell_back(),
            "Segmentation complete"
        );
        Ok(outcome)
    }

    fn run_syntactic(&self, text: &str, config: &SegmentationConfig) -> Vec<Segment> {
        let segments = self.splitter.split(text, config);
        self.overlap
            .apply(segments, config.overlap_percentage, config.budget())
    }

    async fn run_semantic(
        &self,
        text: &str,
        config: &SegmentationConfig,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Segment>> {
        let provider = self.provider.as_ref().ok_or(ChunkingError::MissingProvider)?;

        let placement = self.placer.place(text, provider.as_ref(), config).await?;
        diagnostics.threshold = Some(placement.threshold);

        Ok(self.overlap.apply(
            placement.segments,
            config.overlap_percentage,
            config.budget(),
        ))
    }

    async fn run_hybrid(
        &self,
        text: &str,
        config: &SegmentationConfig,
        refine: bool,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Segment> {
        let base = self.splitter.split(text, config);
        let budget = config.budget();

        if !refine || base.len() < 2 {
            return self.overlap.apply(base, config.overlap_percentage, budget);
        }

        let provider = match &self.provider {
            Some(provider) => provider,
            None => {
                warn!("No embedding provider configured, skipping semantic refinement");
                diagnostics.fallback = Some(Fallback::NoProvider);
                return self.overlap.apply(base, config.overlap_percentage, budget);
            }
        };

        let analysis = match self.analyzer.analyze(&base, provider.as_ref(), config).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(
                    provider = provider.name(),
                    error = %e,
                    "Semantic refinement failed, returning syntactic segments"
                );
                diagnostics.fallback = Some(Fallback::ProviderError(e.to_string()));
                return self.overlap.apply(base, config.overlap_percentage, budget);
            }
        };
        diagnostics.threshold = Some(analysis.threshold);

        let scored = base
            .into_iter()
            .zip(&analysis.coherence)
            .map(|(segment, score)| segment.with_score(*score))
            .collect();
        let (merged, merges) = self
            .merger
            .apply(scored, &analysis, budget, config.merge_size_ratio);
        diagnostics.merges_applied = merges;

        self.overlap.apply(merged, config.overlap_percentage, budget)
    }
}

/// Sequence invariants that only a bug can break.
fn check_invariants(text: &str, segments: &[Segment], budget: usize) {
    debug_assert_eq!(segments.first().map(|s| s.span.start), Some(0));
    debug_assert_eq!(segments.last().map(|s| s.span.end), Some(text.len()));
    for segment in segments {
        debug_assert!(segment.span.end > segment.span.start, "empty span {:?}", segment.span);
        debug_assert!(
            segment.oversized || segment.token_count <= budget,
            "segment {} has {} tokens over budget {}",
            segment.index,
            segment.token_count,
            budget
        );
    }
    for pair in segments.windows(2) {
        debug_assert_eq!(pair[0].span.end, pair[1].span.start, "spans are not contiguous");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbeddingProvider;
    use crate::error::EmbeddingError;
    use crate::types::Tier;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Same vector for every input: every boundary has distance 0.
    struct ConstantProvider;

    #[async_trait]
    impl EmbeddingProvider for ConstantProvider {
        fn name(&self) -> &str {
            "constant"
        }

        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0, 0.0, 0.0])
        }
    }

    /// One axis per keyword so differing topics are orthogonal.
    struct KeywordProvider;

    #[async_trait]
    impl EmbeddingProvider for KeywordProvider {
        fn name(&self) -> &str {
            "keyword"
        }

        async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            if text.contains("Alpha") {
                Ok(vec![1.0, 0.0, 0.0])
            } else if text.contains("Beta") {
                Ok(vec![0.0, 1.0, 0.0])
            } else {
                Ok(vec![0.0, 0.0, 1.0])
            }
        }
    }

    struct FailingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EmbeddingError::Provider(anyhow::anyhow!("service unavailable")))
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl EmbeddingProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![1.0])
        }
    }

    fn paragraph() -> String {
        ["The quick brown fox jumps over the lazy dog."; 4].join(" ")
    }

    /// 20 paragraphs of 48 estimated tokens each.
    fn long_text() -> String {
        vec![paragraph(); 20].join("\n\n")
    }

    fn words(text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn assert_covers(text: &str, segments: &[Segment]) {
        let rebuilt: String = segments.iter().map(|s| s.span.slice(text)).collect();
        assert_eq!(rebuilt, text);
    }

    #[tokio::test]
    async fn test_short_input_single_segment() {
        let engine = ChunkingEngine::new();
        let segments = engine
            .segment("Hello world.", &SegmentationConfig::default(), SegmentationMode::Syntactic)
            .await
            .unwrap();

        assert_eq!(segments.len(), 1);
        assert!(segments[0].token_count > 0);
        assert_eq!(segments[0].content, "Hello world.");
        assert_ne!(segments[0].id, uuid::Uuid::nil());
    }

    #[tokio::test]
    async fn test_short_input_skips_provider_in_every_mode() {
        let engine = ChunkingEngine::new();
        for mode in [SegmentationMode::Semantic, SegmentationMode::Hybrid] {
            let outcome = engine
                .segment_with_report("Hello world.", &SegmentationConfig::default(), mode)
                .await
                .unwrap();
            assert_eq!(outcome.segments.len(), 1);
            assert!(!outcome.fell_back());
        }
    }

    #[tokio::test]
    async fn test_empty_input_yields_no_segments() {
        let engine = ChunkingEngine::new();
        let segments = engine
            .segment(" \n\t \r\n ", &SegmentationConfig::default(), SegmentationMode::Hybrid)
            .await
            .unwrap();
        assert!(segments.is_empty());
    }

    #[tokio::test]
    async fn test_long_text_within_budget() {
        let text = long_text();
        let config = SegmentationConfig::with_max_tokens(100);
        let segments = ChunkingEngine::new()
            .segment(&text, &config, SegmentationMode::Syntactic)
            .await
            .unwrap();

        assert!((8..=12).contains(&segments.len()), "got {} segments", segments.len());
        for (i, segment) in segments.iter().enumerate() {
            assert!(segment.token_count <= 100);
            assert_eq!(segment.index, i);
        }
        assert_covers(&text, &segments);
    }

    #[tokio::test]
    async fn test_overlap_disabled_keeps_span_content() {
        let text = long_text();
        let config = SegmentationConfig::with_max_tokens(100).with_overlap(0);
        let segments = ChunkingEngine::new()
            .segment(&text, &config, SegmentationMode::Syntactic)
            .await
            .unwrap();

        for segment in &segments {
            assert_eq!(segment.content, segment.span.slice(&text));
            assert_eq!(segment.overlap_prefix_tokens, 0);
            assert_eq!(segment.overlap_suffix_tokens, 0);
        }
    }

    #[tokio::test]
    async fn test_overlap_is_injected() {
        let text = long_text();
        let config = SegmentationConfig::with_max_tokens(100).with_overlap(10);
        let segments = ChunkingEngine::new()
            .segment(&text, &config, SegmentationMode::Syntactic)
            .await
            .unwrap();

        assert_eq!(segments[0].overlap_prefix_tokens, 0);
        for segment in &segments[1..] {
            assert!(segment.overlap_prefix_tokens > 0);
            assert!(segment.content.len() > segment.span.len());
        }
    }

    #[tokio::test]
    async fn test_unsplittable_word_is_one_oversized_segment() {
        let text = "x".repeat(5000);
        let outcome = ChunkingEngine::new()
            .segment_with_report(&text, &SegmentationConfig::default(), SegmentationMode::Syntactic)
            .await
            .unwrap();

        assert_eq!(outcome.segments.len(), 1);
        assert!(outcome.segments[0].oversized);
        assert!(outcome.segments[0].token_count > 500);
        assert_eq!(outcome.diagnostics.oversized_segments, 1);
    }

    #[tokio::test]
    async fn test_identical_boundaries_never_merge() {
        let text = long_text();
        let config = SegmentationConfig::with_max_tokens(100).with_threshold(0.5);
        let engine = ChunkingEngine::new().with_provider(Arc::new(ConstantProvider));

        let syntactic = engine
            .segment(&text, &config, SegmentationMode::Syntactic)
            .await
            .unwrap();
        let outcome = engine
            .segment_with_report(&text, &config, SegmentationMode::Hybrid)
            .await
            .unwrap();

        assert_eq!(outcome.diagnostics.merges_applied, 0);
        assert_eq!(outcome.diagnostics.threshold, Some(0.5));
        assert_eq!(outcome.segments.len(), syntactic.len());
        for (hybrid, plain) in outcome.segments.iter().zip(&syntactic) {
            assert_eq!(hybrid.span, plain.span);
            assert_eq!(hybrid.content, plain.content);
            assert_eq!(hybrid.semantic_score, Some(1.0));
        }
    }

    #[tokio::test]
    async fn test_hybrid_merges_dissimilar_cuts() {
        let text = "Alpha intro.\n\n\
                    One two three four. Five six seven eight. Nine ten eleven twelve.\n\n\
                    Beta closing.";
        let config = SegmentationConfig::with_max_tokens(10)
            .with_min_chunk_size(1)
            .with_overlap(0)
            .with_threshold(0.5);
        let engine = ChunkingEngine::new()
            .with_estimator(Arc::new(words))
            .with_provider(Arc::new(KeywordProvider));

        let syntactic = engine
            .segment(text, &config, SegmentationMode::Syntactic)
            .await
            .unwrap();
        assert_eq!(syntactic.len(), 4);

        let outcome = engine
            .segment_with_report(text, &config, SegmentationMode::Hybrid)
            .await
            .unwrap();

        assert_eq!(outcome.diagnostics.merges_applied, 2);
        let segments = &outcome.segments;
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].content, "Alpha intro. One two three four. Five six seven eight. ");
        assert!(segments[1].content.ends_with("Beta closing."));
        assert!(segments.iter().all(|s| s.token_count <= 10));
        assert!(segments.iter().all(|s| s.semantic_score.is_some()));
        assert_covers(text, segments);
    }

    #[tokio::test]
    async fn test_hybrid_falls_back_on_provider_error() {
        let text = long_text();
        let config = SegmentationConfig::with_max_tokens(100);
        let provider = Arc::new(FailingProvider {
            calls: AtomicUsize::new(0),
        });
        let engine = ChunkingEngine::new().with_provider(provider.clone());

        let syntactic = engine
            .segment(&text, &config, SegmentationMode::Syntactic)
            .await
            .unwrap();
        let outcome = engine
            .segment_with_report(&text, &config, SegmentationMode::Hybrid)
            .await
            .unwrap();

        assert!(provider.calls.load(Ordering::SeqCst) > 0);
        assert!(matches!(
            outcome.diagnostics.fallback,
            Some(Fallback::ProviderError(ref message)) if message.contains("service unavailable")
        ));
        assert_eq!(outcome.segments, syntactic);
    }

    #[tokio::test]
    async fn test_hybrid_falls_back_on_timeout() {
        let text = long_text();
        let config = SegmentationConfig::with_max_tokens(100).with_embedding_timeout_ms(20);
        let engine = ChunkingEngine::new().with_provider(Arc::new(SlowProvider));

        let outcome = engine
            .segment_with_report(&text, &config, SegmentationMode::Hybrid)
            .await
            .unwrap();

        assert!(matches!(
            outcome.diagnostics.fallback,
            Some(Fallback::ProviderError(ref message)) if message.contains("timed out")
        ));
        assert!(!outcome.segments.is_empty());
    }

    #[tokio::test]
    async fn test_hybrid_without_provider_reports_fallback() {
        let outcome = ChunkingEngine::new()
            .segment_with_report(
                &long_text(),
                &SegmentationConfig::with_max_tokens(100),
                SegmentationMode::Hybrid,
            )
            .await
            .unwrap();

        assert_eq!(outcome.diagnostics.fallback, Some(Fallback::NoProvider));
        assert_eq!(outcome.diagnostics.strategy, "hybrid");
    }

    #[tokio::test]
    async fn test_hybrid_refinement_disabled_skips_provider() {
        let provider = Arc::new(FailingProvider {
            calls: AtomicUsize::new(0),
        });
        let engine = ChunkingEngine::new().with_provider(provider.clone());
        let config = SegmentationConfig::with_max_tokens(100).with_refinement(false);

        let outcome = engine
            .segment_with_report(&long_text(), &config, SegmentationMode::Hybrid)
            .await
            .unwrap();

        assert!(!outcome.fell_back());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_semantic_requires_provider() {
        let result = ChunkingEngine::new()
            .segment(
                &long_text(),
                &SegmentationConfig::with_max_tokens(100),
                SegmentationMode::Semantic,
            )
            .await;
        assert!(matches!(result, Err(ChunkingError::MissingProvider)));
    }

    #[tokio::test]
    async fn test_semantic_surfaces_provider_error() {
        let engine = ChunkingEngine::new().with_provider(Arc::new(FailingProvider {
            calls: AtomicUsize::new(0),
        }));
        let result = engine
            .segment(
                &long_text(),
                &SegmentationConfig::with_max_tokens(100),
                SegmentationMode::Semantic,
            )
            .await;
        assert!(matches!(
            result,
            Err(ChunkingError::Embedding(EmbeddingError::Provider(_)))
        ));
    }

    #[tokio::test]
    async fn test_semantic_respects_budget_and_coverage() {
        let text = long_text();
        let config = SegmentationConfig::with_max_tokens(100).with_overlap(0);
        let engine =
            ChunkingEngine::new().with_provider(Arc::new(HashingEmbeddingProvider::default()));

        let outcome = engine
            .segment_with_report(&text, &config, SegmentationMode::Semantic)
            .await
            .unwrap();

        assert_eq!(outcome.diagnostics.strategy, "semantic");
        assert!(outcome.diagnostics.threshold.is_some());
        for segment in &outcome.segments {
            assert!(segment.token_count <= 100);
            assert!(segment.semantic_score.is_some());
        }
        assert_covers(&text, &outcome.segments);
    }

    #[tokio::test]
    async fn test_standard_tier_never_embeds() {
        let provider = Arc::new(FailingProvider {
            calls: AtomicUsize::new(0),
        });
        let engine = ChunkingEngine::new().with_provider(provider.clone());
        let config = SegmentationConfig::with_max_tokens(100).with_tier(Tier::Standard);

        for mode in [SegmentationMode::Semantic, SegmentationMode::Hybrid] {
            let outcome = engine
                .segment_with_report(&long_text(), &config, mode)
                .await
                .unwrap();
            assert_eq!(outcome.diagnostics.strategy, "syntactic");
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deterministic_runs() {
        let text = format!(
            "{}\n\nRust ownership moves values between bindings. \
             Borrowing lends access without moving. {}",
            long_text(),
            paragraph()
        );
        let config = SegmentationConfig::with_max_tokens(120);
        let engine = ChunkingEngine::new()
            .with_cached_provider(Arc::new(HashingEmbeddingProvider::default()));

        for mode in [
            SegmentationMode::Syntactic,
            SegmentationMode::Semantic,
            SegmentationMode::Hybrid,
        ] {
            let first = engine.segment(&text, &config, mode).await.unwrap();
            let second = engine.segment(&text, &config, mode).await.unwrap();
            assert_eq!(first, second);
        }
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = SegmentationConfig::default().with_separators::<&str>(&[]);
        let result = ChunkingEngine::new()
            .segment("Hello world.", &config, SegmentationMode::Syntactic)
            .await;
        assert!(matches!(result, Err(ChunkingError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_normalizes_before_splitting() {
        let segments = ChunkingEngine::new()
            .segment(
                "  Hello\t\tworld.\r\n\r\n\r\nSecond   line.  ",
                &SegmentationConfig::default(),
                SegmentationMode::Syntactic,
            )
            .await
            .unwrap();
        assert_eq!(segments[0].content, "Hello world.\n\nSecond line.");
    }

    #[test]
    fn test_builder_accessors() {
        let engine = ChunkingEngine::new();
        assert_eq!(engine.estimator().name(), "heuristic");
        assert!(engine.provider().is_none());

        let words = |text: &str| text.split_whitespace().count();
        let engine = engine
            .with_estimator(Arc::new(words))
            .with_cached_provider(Arc::new(HashingEmbeddingProvider::new(32)));
        assert_eq!(engine.estimator().estimate("one two three"), 3);
        assert_eq!(engine.provider().map(|p| p.name()), Some("hashing"));
    }
}

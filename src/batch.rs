//! Batch segmentation of many documents.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ChunkingError, Result};
use crate::orchestrator::ChunkingEngine;
use crate::types::{Segment, SegmentationConfig, SegmentationMode, SegmentationOutcome};
use crate::DEFAULT_MAX_CONTENT_SIZE;

/// Configuration for batch processing.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum documents segmented concurrently
    pub concurrency: usize,
    /// Whether to continue on individual document failures
    pub continue_on_error: bool,
    /// Maximum document size (bytes); larger documents are rejected
    pub max_content_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            continue_on_error: true,
            max_content_size: DEFAULT_MAX_CONTENT_SIZE,
        }
    }
}

/// A document submitted for segmentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub text: String,
}

impl Document {
    /// Create a document with a random id.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), text)
    }

    pub fn with_id(id: Uuid, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

/// Segments produced for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSegments {
    pub document_id: Uuid,
    pub segments: Vec<Segment>,
    /// True when hybrid refinement fell back to syntactic segments
    pub fell_back: bool,
}

/// Result of batch processing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub total_documents: usize,
    pub processed_documents: usize,
    pub failed_documents: usize,
    pub total_segments: usize,
    pub fallbacks: usize,
    pub errors: Vec<BatchError>,
}

/// Error during batch processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    pub document_id: Uuid,
    pub error: String,
}

/// Segments many documents with bounded concurrency.
///
/// Output order always matches input order.
pub struct BatchSegmenter {
    engine: Arc<ChunkingEngine>,
    config: BatchConfig,
}

impl BatchSegmenter {
    /// Create a new batch segmenter.
    pub fn new(engine: Arc<ChunkingEngine>, config: BatchConfig) -> Self {
        Self { engine, config }
    }

    /// Segment every document and return the per-document results.
    pub async fn process_batch(
        &self,
        documents: Vec<Document>,
        config: &SegmentationConfig,
        mode: SegmentationMode,
    ) -> Result<(Vec<DocumentSegments>, BatchResult)> {
        let mut result = BatchResult {
            total_documents: documents.len(),
            ..Default::default()
        };
        let mut outputs = Vec::with_capacity(documents.len());

        info!(total_documents = result.total_documents, %mode, "Starting batch segmentation");

        let mut results = self.run(documents, config, mode);
        while let Some((document_id, outcome)) = results.next().await {
            match outcome {
                Ok(outcome) => {
                    let output = record_success(&mut result, document_id, outcome);
                    outputs.push(output);
                }
                Err(e) => {
                    record_failure(&mut result, document_id, &e);
                    if !self.config.continue_on_error {
                        return Err(e);
                    }
                }
            }
        }

        info!(
            processed = result.processed_documents,
            failed = result.failed_documents,
            segments = result.total_segments,
            "Batch segmentation complete"
        );

        Ok((outputs, result))
    }

    /// Segment every document, sending each result downstream as it completes.
    pub async fn process_batch_streaming(
        &self,
        documents: Vec<Document>,
        config: &SegmentationConfig,
        mode: SegmentationMode,
        sender: mpsc::Sender<DocumentSegments>,
    ) -> Result<BatchResult> {
        let mut result = BatchResult {
            total_documents: documents.len(),
            ..Default::default()
        };

        let mut results = self.run(documents, config, mode);
        while let Some((document_id, outcome)) = results.next().await {
            match outcome {
                Ok(outcome) => {
                    let output = record_success(&mut result, document_id, outcome);
                    if sender.send(output).await.is_err() {
                        warn!("Receiver dropped, stopping batch segmentation");
                        break;
                    }
                }
                Err(e) => {
                    record_failure(&mut result, document_id, &e);
                    if !self.config.continue_on_error {
                        return Err(e);
                    }
                }
            }
        }

        Ok(result)
    }

    fn run<'a>(
        &'a self,
        documents: Vec<Document>,
        config: &'a SegmentationConfig,
        mode: SegmentationMode,
    ) -> impl futures::Stream<Item = (Uuid, Result<SegmentationOutcome>)> + 'a {
        stream::iter(documents)
            .map(move |document| async move {
                let outcome = self.process_single(&document, config, mode).await;
                (document.id, outcome)
            })
            .buffered(self.config.concurrency.max(1))
    }

    async fn process_single(
        &self,
        document: &Document,
        config: &SegmentationConfig,
        mode: SegmentationMode,
    ) -> Result<SegmentationOutcome> {
        let size = document.text.len();
        if size > self.config.max_content_size {
            debug!(
                document_id = %document.id,
                size,
                limit = self.config.max_content_size,
                "Document exceeds max size"
            );
            return Err(ChunkingError::ContentTooLarge {
                size,
                limit: self.config.max_content_size,
            });
        }

        self.engine
            .segment_with_report(&document.text, config, mode)
            .await
    }
}

fn record_success(
    result: &mut BatchResult,
    document_id: Uuid,
    outcome: SegmentationOutcome,
) -> DocumentSegments {
    let fell_back = outcome.fell_back();
    result.processed_documents += 1;
    result.total_segments += outcome.segments.len();
    if fell_back {
        result.fallbacks += 1;
    }
    DocumentSegments {
        document_id,
        segments: outcome.segments,
        fell_back,
    }
}

fn record_failure(result: &mut BatchResult, document_id: Uuid, error: &ChunkingError) {
    warn!(document_id = %document_id, error = %error, "Failed to segment document");
    result.failed_documents += 1;
    result.errors.push(BatchError {
        document_id,
        error: error.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter(config: BatchConfig) -> BatchSegmenter {
        BatchSegmenter::new(Arc::new(ChunkingEngine::new()), config)
    }

    fn long_document() -> String {
        vec!["The quick brown fox jumps over the lazy dog."; 40].join(" ")
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let documents = vec![
            Document::new("First document."),
            Document::new(long_document()),
            Document::new("Third document."),
        ];
        let ids: Vec<Uuid> = documents.iter().map(|d| d.id).collect();

        let (outputs, result) = segmenter(BatchConfig::default())
            .process_batch(
                documents,
                &SegmentationConfig::with_max_tokens(100),
                SegmentationMode::Syntactic,
            )
            .await
            .unwrap();

        assert_eq!(outputs.iter().map(|o| o.document_id).collect::<Vec<_>>(), ids);
        assert_eq!(result.processed_documents, 3);
        assert_eq!(result.failed_documents, 0);
        assert!(outputs[1].segments.len() > 1);
        assert_eq!(
            result.total_segments,
            outputs.iter().map(|o| o.segments.len()).sum::<usize>()
        );
    }

    #[tokio::test]
    async fn test_oversized_document_rejected() {
        let config = BatchConfig {
            max_content_size: 20,
            ..Default::default()
        };
        let documents = vec![
            Document::new("Short."),
            Document::new("This document is far longer than twenty bytes."),
        ];

        let (outputs, result) = segmenter(config)
            .process_batch(
                documents,
                &SegmentationConfig::default(),
                SegmentationMode::Syntactic,
            )
            .await
            .unwrap();

        assert_eq!(outputs.len(), 1);
        assert_eq!(result.failed_documents, 1);
        assert!(result.errors[0].error.contains("content too large"));
    }

    #[tokio::test]
    async fn test_stop_on_first_error() {
        let config = BatchConfig {
            max_content_size: 5,
            continue_on_error: false,
            ..Default::default()
        };
        let result = segmenter(config)
            .process_batch(
                vec![Document::new("Too long for the limit.")],
                &SegmentationConfig::default(),
                SegmentationMode::Syntactic,
            )
            .await;

        assert!(matches!(
            result,
            Err(ChunkingError::ContentTooLarge { limit: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_fallbacks_counted() {
        let (outputs, result) = segmenter(BatchConfig::default())
            .process_batch(
                vec![Document::new(long_document())],
                &SegmentationConfig::with_max_tokens(100),
                SegmentationMode::Hybrid,
            )
            .await
            .unwrap();

        assert!(outputs[0].fell_back);
        assert_eq!(result.fallbacks, 1);
    }

    #[tokio::test]
    async fn test_streaming() {
        let (sender, mut receiver) = mpsc::channel(4);
        let documents = vec![Document::new("One."), Document::new("Two.")];

        let result = segmenter(BatchConfig::default())
            .process_batch_streaming(
                documents,
                &SegmentationConfig::default(),
                SegmentationMode::Syntactic,
                sender,
            )
            .await
            .unwrap();

        assert_eq!(result.processed_documents, 2);
        let mut received = Vec::new();
        while let Some(output) = receiver.recv().await {
            received.push(output);
        }
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].segments[0].content, "One.");
    }

    #[test]
    fn test_document_ids_are_unique() {
        let a = Document::new("same");
        let b = Document::new("same");
        assert_ne!(a.id, b.id);
    }
}

//! Handlers for queued analysis messages.

use std::sync::Arc;

use async_trait::async_trait;

use etalon_core::{AnalysisMessage, BatchReport};
use etalon_engine::Pipeline;

/// Result of handling one message.
#[derive(Debug)]
pub enum MessageResult {
    /// Batch processed; the report is stored with the message.
    Success(BatchReport),
    /// Permanent failure; the message will not be retried.
    Failed(String),
    /// Transient failure; the message may be retried.
    Retry(String),
}

/// Trait for message handlers.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process a claimed message.
    async fn handle(&self, message: &AnalysisMessage) -> MessageResult;
}

/// Runs queued batches through the similarity pipeline.
pub struct AnalysisHandler {
    pipeline: Arc<Pipeline>,
}

impl AnalysisHandler {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl MessageHandler for AnalysisHandler {
    async fn handle(&self, message: &AnalysisMessage) -> MessageResult {
        match self.pipeline.run(&message.batch).await {
            Ok(outcome) => MessageResult::Success(outcome.report),
            Err(e) if e.is_retryable() => MessageResult::Retry(e.to_string()),
            Err(e) => MessageResult::Failed(e.to_string()),
        }
    }
}

/// Handler that accepts every message with an empty report. Useful in tests.
pub struct NoOpHandler;

#[async_trait]
impl MessageHandler for NoOpHandler {
    async fn handle(&self, _message: &AnalysisMessage) -> MessageResult {
        MessageResult::Success(BatchReport::default())
    }
}

//! Worker tests against the in-memory queue and reference store.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use etalon_db::{InMemoryAnalysisQueue, InMemoryReferenceStore};
use etalon_engine::{EngineConfig, Pipeline, RuleBasedNormalizer};
use etalon_jobs::{
    AnalysisHandler, AnalysisMessage, AnalysisQueue, AnalysisWorker, BatchReport, Error,
    InputBatch, InputItem, Label, MessageHandler, MessageResult, MessageStatus, NoOpHandler,
    ReferenceSample, ReferenceStore, Result, WorkerBuilder, WorkerConfig, WorkerEvent,
};
use uuid::Uuid;

const TEXT: &str = "Кошка сидит на окне. Собака спит у двери.";

fn plagiarism_batch() -> InputBatch {
    InputBatch::new(vec![
        InputItem::new(TEXT, Label::Score(1)),
        InputItem::new(TEXT, Label::Unlabeled),
    ])
}

fn analysis_worker(
    queue: Arc<InMemoryAnalysisQueue>,
    store: Arc<InMemoryReferenceStore>,
) -> AnalysisWorker {
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(RuleBasedNormalizer::new()),
        store,
        EngineConfig::default(),
    ));
    WorkerBuilder::new(queue, Arc::new(AnalysisHandler::new(pipeline)))
        .with_config(WorkerConfig::default().with_poll_interval(10))
        .build()
}

/// Always reports a transient failure.
struct FlakyHandler;

#[async_trait]
impl MessageHandler for FlakyHandler {
    async fn handle(&self, _message: &AnalysisMessage) -> MessageResult {
        MessageResult::Retry("Database error: connection reset".to_string())
    }
}

/// Never finishes within any reasonable timeout.
struct SlowHandler;

#[async_trait]
impl MessageHandler for SlowHandler {
    async fn handle(&self, _message: &AnalysisMessage) -> MessageResult {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        MessageResult::Failed("unreachable".to_string())
    }
}

/// Loses the first completion acknowledgement.
struct DroppedAckQueue {
    inner: InMemoryAnalysisQueue,
    dropped: AtomicBool,
}

impl DroppedAckQueue {
    fn new() -> Self {
        Self {
            inner: InMemoryAnalysisQueue::new(),
            dropped: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl AnalysisQueue for DroppedAckQueue {
    async fn enqueue(&self, batch: &InputBatch) -> Result<Uuid> {
        self.inner.enqueue(batch).await
    }

    async fn claim_next(&self) -> Result<Option<AnalysisMessage>> {
        self.inner.claim_next().await
    }

    async fn complete(&self, id: Uuid, report: &BatchReport) -> Result<()> {
        if !self.dropped.swap(true, Ordering::SeqCst) {
            return Err(Error::Queue("connection reset".to_string()));
        }
        self.inner.complete(id, report).await
    }

    async fn fail(&self, id: Uuid, error: &str, retryable: bool) -> Result<MessageStatus> {
        self.inner.fail(id, error, retryable).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisMessage>> {
        self.inner.get(id).await
    }

    async fn pending_count(&self) -> Result<i64> {
        self.inner.pending_count().await
    }
}

fn corpus_unreachable() -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "corpus unreachable",
    ))
}

/// Corpus backend that is unreachable.
#[derive(Default)]
struct UnreachableStore {
    upserts: AtomicUsize,
}

#[async_trait]
impl ReferenceStore for UnreachableStore {
    async fn get_all(&self) -> Result<Vec<ReferenceSample>> {
        Err(corpus_unreachable())
    }

    async fn get_theme(&self, _theme: &str) -> Result<Vec<ReferenceSample>> {
        Err(corpus_unreachable())
    }

    async fn upsert_all(&self, samples: &[ReferenceSample]) -> Result<u64> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(samples.len() as u64)
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        Ok(0)
    }
}

#[tokio::test]
async fn test_empty_queue_processes_nothing() {
    let worker = analysis_worker(
        Arc::new(InMemoryAnalysisQueue::new()),
        Arc::new(InMemoryReferenceStore::new()),
    );
    assert_eq!(worker.process_next().await.unwrap(), None);
}

#[tokio::test]
async fn test_completed_message_carries_report() {
    let queue = Arc::new(InMemoryAnalysisQueue::new());
    let store = Arc::new(InMemoryReferenceStore::new());
    let worker = analysis_worker(queue.clone(), store.clone());

    let id = queue.enqueue(&plagiarism_batch()).await.unwrap();
    assert_eq!(worker.pending_count().await.unwrap(), 1);

    let processed = worker.process_next().await.unwrap();
    assert_eq!(processed, Some((id, MessageStatus::Completed)));

    let message = queue.get(id).await.unwrap().unwrap();
    assert_eq!(message.status, MessageStatus::Completed);
    let report = message.result.unwrap();
    assert_eq!(report.flagged.len(), 1);
    assert_eq!(report.texts[0].text, TEXT);
    assert!(message.completed_at.is_some());

    assert_eq!(store.count().await.unwrap(), 2);
    assert_eq!(worker.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_messages_are_processed_in_submission_order() {
    let queue = Arc::new(InMemoryAnalysisQueue::new());
    let worker = WorkerBuilder::new(queue.clone(), Arc::new(NoOpHandler)).build();

    let first = queue.enqueue(&plagiarism_batch()).await.unwrap();
    let second = queue.enqueue(&plagiarism_batch()).await.unwrap();

    let (a, _) = worker.process_next().await.unwrap().unwrap();
    let (b, _) = worker.process_next().await.unwrap().unwrap();
    assert_eq!((a, b), (first, second));
}

#[tokio::test]
async fn test_invalid_batch_fails_without_retry() {
    let queue = Arc::new(InMemoryAnalysisQueue::new());
    let store = Arc::new(InMemoryReferenceStore::new());
    let worker = analysis_worker(queue.clone(), store.clone());

    let batch = InputBatch::new(vec![
        InputItem::new(TEXT, Label::Score(1)),
        InputItem::new("", Label::Unlabeled),
    ]);
    let id = queue.enqueue(&batch).await.unwrap();

    let processed = worker.process_next().await.unwrap();
    assert_eq!(processed, Some((id, MessageStatus::Failed)));

    let message = queue.get(id).await.unwrap().unwrap();
    assert_eq!(message.retry_count, 0);
    assert!(message.error_message.unwrap().contains("Empty text"));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_transient_failure_retries_until_exhausted() {
    let queue = Arc::new(InMemoryAnalysisQueue::new().with_max_retries(1));
    let worker = WorkerBuilder::new(queue.clone(), Arc::new(FlakyHandler)).build();
    let id = queue.enqueue(&plagiarism_batch()).await.unwrap();

    assert_eq!(
        worker.process_next().await.unwrap(),
        Some((id, MessageStatus::Pending))
    );
    assert_eq!(queue.get(id).await.unwrap().unwrap().retry_count, 1);

    assert_eq!(
        worker.process_next().await.unwrap(),
        Some((id, MessageStatus::Failed))
    );
    assert_eq!(worker.process_next().await.unwrap(), None);
}

#[tokio::test]
async fn test_lost_completion_requeues_message() {
    let queue = Arc::new(DroppedAckQueue::new());
    let store = Arc::new(InMemoryReferenceStore::new());
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(RuleBasedNormalizer::new()),
        store.clone(),
        EngineConfig::default(),
    ));
    let worker = WorkerBuilder::new(queue.clone(), Arc::new(AnalysisHandler::new(pipeline))).build();
    let id = queue.enqueue(&plagiarism_batch()).await.unwrap();

    assert_eq!(
        worker.process_next().await.unwrap(),
        Some((id, MessageStatus::Pending))
    );
    let message = queue.get(id).await.unwrap().unwrap();
    assert_eq!(message.retry_count, 1);
    assert!(message.error_message.unwrap().contains("connection reset"));

    assert_eq!(
        worker.process_next().await.unwrap(),
        Some((id, MessageStatus::Completed))
    );
    let message = queue.get(id).await.unwrap().unwrap();
    assert_eq!(message.result.unwrap().flagged.len(), 1);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_unreachable_corpus_is_retried_without_persisting() {
    let store = Arc::new(UnreachableStore::default());
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(RuleBasedNormalizer::new()),
        store.clone(),
        EngineConfig::default(),
    ));
    let handler = AnalysisHandler::new(pipeline);

    let queue = InMemoryAnalysisQueue::new();
    let id = queue.enqueue(&plagiarism_batch()).await.unwrap();
    let message = queue.get(id).await.unwrap().unwrap();

    match handler.handle(&message).await {
        MessageResult::Retry(error) => assert!(error.contains("corpus unreachable")),
        other => panic!("expected retry, got {:?}", other),
    }
    assert_eq!(store.upserts.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_treated_as_transient() {
    let queue = Arc::new(InMemoryAnalysisQueue::new());
    let worker = WorkerBuilder::new(queue.clone(), Arc::new(SlowHandler))
        .with_config(WorkerConfig::default().with_timeout(1))
        .build();
    let id = queue.enqueue(&plagiarism_batch()).await.unwrap();

    assert_eq!(
        worker.process_next().await.unwrap(),
        Some((id, MessageStatus::Pending))
    );
    let message = queue.get(id).await.unwrap().unwrap();
    assert!(message.error_message.unwrap().contains("timeout"));
}

#[tokio::test]
async fn test_started_worker_drains_queue_and_stops() {
    let queue = Arc::new(InMemoryAnalysisQueue::new());
    let store = Arc::new(InMemoryReferenceStore::new());
    let handle = analysis_worker(queue.clone(), store).start();
    let mut events = handle.events();

    let id = queue.enqueue(&plagiarism_batch()).await.unwrap();

    let completed = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Ok(WorkerEvent::MessageCompleted {
                    message_id,
                    flagged_count,
                }) => break (message_id, flagged_count),
                Ok(_) => continue,
                Err(e) => panic!("event channel closed: {}", e),
            }
        }
    })
    .await
    .expect("worker did not complete the message");
    assert_eq!(completed, (id, 1));

    handle.shutdown().await.unwrap();
    let stopped = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Ok(WorkerEvent::WorkerStopped) = events.recv().await {
                break;
            }
        }
    })
    .await;
    assert!(stopped.is_ok());
}

#[tokio::test]
async fn test_disabled_worker_leaves_queue_untouched() {
    let queue = Arc::new(InMemoryAnalysisQueue::new());
    let id = queue.enqueue(&plagiarism_batch()).await.unwrap();

    let handle = WorkerBuilder::new(queue.clone(), Arc::new(NoOpHandler))
        .with_config(WorkerConfig::default().with_enabled(false))
        .build()
        .start();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        queue.get(id).await.unwrap().unwrap().status,
        MessageStatus::Pending
    );
    drop(handle);
}

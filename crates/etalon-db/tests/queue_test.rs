//! Integration tests for the PostgreSQL ingestion queue.
//!
//! Require a running PostgreSQL; run with `cargo test -- --ignored`.

use etalon_db::test_fixtures::TestDatabase;
use etalon_db::{AnalysisQueue, BatchReport, InputBatch, InputItem, Label, MessageStatus};

fn batch(text: &str) -> InputBatch {
    InputBatch::new(vec![InputItem::new(text, Label::Unlabeled)]).with_theme("t")
}

#[tokio::test]
#[ignore]
async fn test_enqueue_claim_complete() {
    let test_db = TestDatabase::new().await;
    let queue = &test_db.queue;

    let id = queue.enqueue(&batch("Кошка сидит.")).await.unwrap();
    assert_eq!(queue.pending_count().await.unwrap(), 1);

    let claimed = queue.claim_next().await.unwrap().expect("message");
    assert_eq!(claimed.id, id);
    assert_eq!(claimed.status, MessageStatus::Running);
    assert_eq!(claimed.batch, batch("Кошка сидит."));
    assert!(queue.claim_next().await.unwrap().is_none());

    let report = BatchReport {
        fragment_count: 1,
        ..Default::default()
    };
    queue.complete(id, &report).await.unwrap();

    let message = queue.get(id).await.unwrap().unwrap();
    assert_eq!(message.status, MessageStatus::Completed);
    assert_eq!(message.result, Some(report));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_retryable_failure_then_exhaustion() {
    let test_db = TestDatabase::new().await;
    let queue = test_db.queue.clone().with_max_retries(1);

    let id = queue.enqueue(&batch("Текст.")).await.unwrap();
    queue.claim_next().await.unwrap();
    assert_eq!(
        queue.fail(id, "timeout", true).await.unwrap(),
        MessageStatus::Pending
    );

    queue.claim_next().await.unwrap();
    assert_eq!(
        queue.fail(id, "timeout", true).await.unwrap(),
        MessageStatus::Failed
    );

    let message = queue.get(id).await.unwrap().unwrap();
    assert_eq!(message.retry_count, 1);
    assert_eq!(message.error_message.as_deref(), Some("timeout"));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_expired_running_message_is_reclaimed() {
    let test_db = TestDatabase::new().await;
    let queue = test_db.queue.clone().with_lease_secs(0);

    let id = queue.enqueue(&batch("Текст.")).await.unwrap();
    queue.claim_next().await.unwrap().expect("message");
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let reclaimed = queue.claim_next().await.unwrap().expect("reclaimed");
    assert_eq!(reclaimed.id, id);
    assert_eq!(reclaimed.retry_count, 1);

    test_db.cleanup().await;
}

//! In-memory implementations of the store and queue traits.
//!
//! Same semantics as the PostgreSQL repositories, without durability. Used by
//! tests and by embedders that keep the corpus in process.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use etalon_core::{
    defaults, AnalysisMessage, AnalysisQueue, BatchReport, Error, InputBatch, MessageStatus,
    ReferenceSample, ReferenceStore, Result,
};

/// Reference corpus held in a sorted map keyed by `(id, part)`.
#[derive(Default)]
pub struct InMemoryReferenceStore {
    samples: RwLock<BTreeMap<(Uuid, i32), ReferenceSample>>,
}

impl InMemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with samples.
    pub fn with_samples(samples: impl IntoIterator<Item = ReferenceSample>) -> Self {
        let map = samples
            .into_iter()
            .map(|s| ((s.id, s.part), s))
            .collect::<BTreeMap<_, _>>();
        Self {
            samples: RwLock::new(map),
        }
    }
}

#[async_trait]
impl ReferenceStore for InMemoryReferenceStore {
    async fn get_all(&self) -> Result<Vec<ReferenceSample>> {
        Ok(self.samples.read().await.values().cloned().collect())
    }

    async fn get_theme(&self, theme: &str) -> Result<Vec<ReferenceSample>> {
        Ok(self
            .samples
            .read()
            .await
            .values()
            .filter(|s| s.theme.as_deref() == Some(theme))
            .cloned()
            .collect())
    }

    async fn upsert_all(&self, samples: &[ReferenceSample]) -> Result<u64> {
        let mut map = self.samples.write().await;
        let mut changed = 0;
        for sample in samples {
            let key = (sample.id, sample.part);
            if map.get(&key) != Some(sample) {
                map.insert(key, sample.clone());
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn clear(&self) -> Result<()> {
        self.samples.write().await.clear();
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.samples.read().await.len() as i64)
    }
}

#[derive(Default)]
struct QueueState {
    messages: BTreeMap<Uuid, AnalysisMessage>,
    /// Enqueue order, oldest first.
    order: Vec<Uuid>,
}

/// Analysis queue held in process memory.
pub struct InMemoryAnalysisQueue {
    state: Mutex<QueueState>,
    max_retries: i32,
    lease_secs: u64,
}

impl Default for InMemoryAnalysisQueue {
    fn default() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            max_retries: defaults::QUEUE_MAX_RETRIES,
            lease_secs: defaults::QUEUE_LEASE_SECS,
        }
    }
}

impl InMemoryAnalysisQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries.max(0);
        self
    }

    pub fn with_lease_secs(mut self, lease_secs: u64) -> Self {
        self.lease_secs = lease_secs;
        self
    }
}

#[async_trait]
impl AnalysisQueue for InMemoryAnalysisQueue {
    async fn enqueue(&self, batch: &InputBatch) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let message = AnalysisMessage {
            id,
            batch: batch.clone(),
            status: MessageStatus::Pending,
            result: None,
            error_message: None,
            retry_count: 0,
            max_retries: self.max_retries,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        let mut state = self.state.lock().await;
        state.messages.insert(id, message);
        state.order.push(id);
        Ok(id)
    }

    async fn claim_next(&self) -> Result<Option<AnalysisMessage>> {
        let now = Utc::now();
        // None when the lease is too long to represent: nothing expires.
        let lease_expiry = i64::try_from(self.lease_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lease| now.checked_sub_signed(lease));
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let next = state.order.iter().find(|id| {
            state.messages.get(*id).is_some_and(|m| match m.status {
                MessageStatus::Pending => true,
                MessageStatus::Running => {
                    matches!((m.started_at, lease_expiry), (Some(t), Some(expiry)) if t <= expiry)
                }
                _ => false,
            })
        });
        let Some(id) = next.copied() else {
            return Ok(None);
        };
        let message = state
            .messages
            .get_mut(&id)
            .ok_or_else(|| Error::Internal(format!("queue index out of sync for {}", id)))?;
        if message.status == MessageStatus::Running {
            message.retry_count += 1;
        }
        message.status = MessageStatus::Running;
        message.started_at = Some(now);
        Ok(Some(message.clone()))
    }

    async fn complete(&self, id: Uuid, report: &BatchReport) -> Result<()> {
        let mut state = self.state.lock().await;
        let message = state
            .messages
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("analysis message {}", id)))?;
        message.status = MessageStatus::Completed;
        message.result = Some(report.clone());
        message.error_message = None;
        message.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn fail(&self, id: Uuid, error: &str, retryable: bool) -> Result<MessageStatus> {
        let mut state = self.state.lock().await;
        let message = state
            .messages
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("analysis message {}", id)))?;
        message.error_message = Some(error.to_string());
        if retryable && message.retry_count < message.max_retries {
            message.retry_count += 1;
            message.status = MessageStatus::Pending;
            message.started_at = None;
        } else {
            message.status = MessageStatus::Failed;
            message.completed_at = Some(Utc::now());
        }
        Ok(message.status)
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisMessage>> {
        Ok(self.state.lock().await.messages.get(&id).cloned())
    }

    async fn pending_count(&self) -> Result<i64> {
        Ok(self
            .state
            .lock()
            .await
            .messages
            .values()
            .filter(|m| m.status == MessageStatus::Pending)
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::reference_sample;
    use etalon_core::{InputItem, Label};

    fn batch(text: &str) -> InputBatch {
        InputBatch::new(vec![InputItem::new(text, Label::Unlabeled)])
    }

    #[tokio::test]
    async fn test_upsert_inserts_and_counts() {
        let store = InMemoryReferenceStore::new();
        let id = Uuid::new_v4();
        let changed = store
            .upsert_all(&[
                reference_sample(id, 0, &[&["кошка"]], 1.0),
                reference_sample(id, 1, &[&["собака"]], 0.0),
            ])
            .await
            .unwrap();
        assert_eq!(changed, 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_identical_content_is_idempotent() {
        let store = InMemoryReferenceStore::new();
        let sample = reference_sample(Uuid::new_v4(), 0, &[&["кошка", "окно"]], 0.5);

        assert_eq!(store.upsert_all(&[sample.clone()]).await.unwrap(), 1);
        let before = store.get_all().await.unwrap();
        assert_eq!(store.upsert_all(&[sample]).await.unwrap(), 0);
        assert_eq!(store.get_all().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_upsert_updates_non_key_fields() {
        let store = InMemoryReferenceStore::new();
        let id = Uuid::new_v4();
        store
            .upsert_all(&[reference_sample(id, 0, &[&["кошка"]], 0.2)])
            .await
            .unwrap();
        store
            .upsert_all(&[reference_sample(id, 0, &[&["собака"]], 0.9)])
            .await
            .unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].weight, 0.9);
        assert!(all[0].order1[0].contains("собака"));
    }

    #[tokio::test]
    async fn test_get_theme_filters_partition() {
        let mut history = reference_sample(Uuid::new_v4(), 0, &[&["война"]], 1.0);
        history.theme = Some("history".to_string());
        let plain = reference_sample(Uuid::new_v4(), 0, &[&["мир"]], 1.0);
        let store = InMemoryReferenceStore::with_samples(vec![history.clone(), plain]);

        assert_eq!(store.get_theme("history").await.unwrap(), vec![history]);
        assert!(store.get_theme("biology").await.unwrap().is_empty());
        assert_eq!(store.get_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_empties_store() {
        let store = InMemoryReferenceStore::with_samples(vec![reference_sample(
            Uuid::new_v4(),
            0,
            &[&["кошка"]],
            1.0,
        )]);
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_queue_claims_oldest_first() {
        let queue = InMemoryAnalysisQueue::new();
        let first = queue.enqueue(&batch("Первый.")).await.unwrap();
        let second = queue.enqueue(&batch("Второй.")).await.unwrap();
        assert_eq!(queue.pending_count().await.unwrap(), 2);

        let claimed = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, first);
        assert_eq!(claimed.status, MessageStatus::Running);
        assert!(claimed.started_at.is_some());

        let claimed = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, second);
        assert!(queue.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_queue_running_message_is_held_until_lease_expires() {
        let queue = InMemoryAnalysisQueue::new();
        queue.enqueue(&batch("Текст.")).await.unwrap();

        queue.claim_next().await.unwrap().unwrap();
        assert!(queue.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_queue_reclaims_expired_running_message() {
        let queue = InMemoryAnalysisQueue::new().with_lease_secs(0);
        let id = queue.enqueue(&batch("Текст.")).await.unwrap();

        let first = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(first.retry_count, 0);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let reclaimed = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(reclaimed.id, id);
        assert_eq!(reclaimed.status, MessageStatus::Running);
        assert_eq!(reclaimed.retry_count, 1);
    }

    #[tokio::test]
    async fn test_queue_complete_stores_report() {
        let queue = InMemoryAnalysisQueue::new();
        let id = queue.enqueue(&batch("Текст.")).await.unwrap();
        queue.claim_next().await.unwrap();

        let report = BatchReport {
            fragment_count: 1,
            ..Default::default()
        };
        queue.complete(id, &report).await.unwrap();

        let message = queue.get(id).await.unwrap().unwrap();
        assert_eq!(message.status, MessageStatus::Completed);
        assert_eq!(message.result, Some(report));
        assert!(message.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_queue_retryable_failure_returns_to_pending_until_budget_spent() {
        let queue = InMemoryAnalysisQueue::new().with_max_retries(1);
        let id = queue.enqueue(&batch("Текст.")).await.unwrap();

        queue.claim_next().await.unwrap();
        let status = queue.fail(id, "store down", true).await.unwrap();
        assert_eq!(status, MessageStatus::Pending);
        assert_eq!(queue.pending_count().await.unwrap(), 1);

        queue.claim_next().await.unwrap();
        let status = queue.fail(id, "store down", true).await.unwrap();
        assert_eq!(status, MessageStatus::Failed);

        let message = queue.get(id).await.unwrap().unwrap();
        assert_eq!(message.retry_count, 1);
        assert_eq!(message.error_message.as_deref(), Some("store down"));
    }

    #[tokio::test]
    async fn test_queue_permanent_failure_skips_retries() {
        let queue = InMemoryAnalysisQueue::new();
        let id = queue.enqueue(&batch("")).await.unwrap();
        queue.claim_next().await.unwrap();

        let status = queue.fail(id, "empty text", false).await.unwrap();
        assert_eq!(status, MessageStatus::Failed);
        assert_eq!(queue.get(id).await.unwrap().unwrap().retry_count, 0);
    }

    #[tokio::test]
    async fn test_queue_unknown_message_is_not_found() {
        let queue = InMemoryAnalysisQueue::new();
        let err = queue
            .complete(Uuid::new_v4(), &BatchReport::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(queue.get(Uuid::new_v4()).await.unwrap().is_none());
    }
}

//! Queue worker that drains the ingestion queue through a message handler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use etalon_core::{defaults, AnalysisMessage, AnalysisQueue, Error, MessageStatus, Result};

use crate::handler::{MessageHandler, MessageResult};

/// Configuration for the queue worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds when the queue is empty.
    pub poll_interval_ms: u64,
    /// Upper bound on one message's processing time, in seconds.
    pub timeout_secs: u64,
    /// Retries granted to transient failures of a newly queued message.
    pub max_retries: i32,
    /// Age in seconds after which an abandoned running message is reclaimed.
    /// Always greater than `timeout_secs`.
    pub lease_secs: u64,
    /// Whether to enable queue processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::WORKER_POLL_INTERVAL_MS,
            timeout_secs: defaults::MESSAGE_TIMEOUT_SECS,
            max_retries: defaults::QUEUE_MAX_RETRIES,
            lease_secs: defaults::QUEUE_LEASE_SECS,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WORKER_ENABLED` | `true` | Enable/disable queue processing |
    /// | `WORKER_POLL_INTERVAL_MS` | `500` | Polling interval when queue is empty |
    /// | `MESSAGE_TIMEOUT_SECS` | `300` | Per-message processing limit |
    /// | `QUEUE_MAX_RETRIES` | `3` | Retries for transient failures |
    /// | `QUEUE_LEASE_SECS` | `900` | Reclaim running messages older than this |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = lookup("WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let poll_interval_ms = lookup("WORKER_POLL_INTERVAL_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::WORKER_POLL_INTERVAL_MS);

        let timeout_secs = lookup("MESSAGE_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::MESSAGE_TIMEOUT_SECS)
            .max(1);

        let max_retries = lookup("QUEUE_MAX_RETRIES")
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(defaults::QUEUE_MAX_RETRIES)
            .max(0);

        let lease_secs = lookup("QUEUE_LEASE_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::QUEUE_LEASE_SECS)
            .max(timeout_secs.saturating_add(1));

        Self {
            poll_interval_ms,
            timeout_secs,
            max_retries,
            lease_secs,
            enabled,
        }
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self.lease_secs = self.lease_secs.max(self.timeout_secs.saturating_add(1));
        self
    }

    pub fn with_lease(mut self, secs: u64) -> Self {
        self.lease_secs = secs.max(self.timeout_secs.saturating_add(1));
        self
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries.max(0);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the queue worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// A message was claimed and handed to the handler.
    MessageStarted { message_id: Uuid },
    /// A message completed and its report was stored.
    MessageCompleted {
        message_id: Uuid,
        flagged_count: usize,
    },
    /// A message failed; `status` tells whether it was requeued.
    MessageFailed {
        message_id: Uuid,
        status: MessageStatus,
        error: String,
    },
    WorkerStarted,
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    ///
    /// A message already being processed runs to completion first.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Worker that claims queued batches one at a time and acknowledges them.
pub struct AnalysisWorker {
    queue: Arc<dyn AnalysisQueue>,
    handler: Arc<dyn MessageHandler>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl AnalysisWorker {
    pub fn new(
        queue: Arc<dyn AnalysisQueue>,
        handler: Arc<dyn MessageHandler>,
        config: WorkerConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            queue,
            handler,
            config,
            event_tx,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Get the pending message count.
    pub async fn pending_count(&self) -> Result<i64> {
        self.queue.pending_count().await
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Poll loop. Sleeps only when the queue is empty.
    #[instrument(skip(self, shutdown_rx), fields(subsystem = "jobs", component = "worker"))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Queue worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            timeout_secs = self.config.timeout_secs,
            "Queue worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Queue worker received shutdown signal");
                break;
            }

            let processed = match self.process_next().await {
                Ok(processed) => processed.is_some(),
                Err(e) => {
                    error!(error = %e, "Failed to process queued message");
                    false
                }
            };

            if !processed {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Queue worker received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Queue worker stopped");
    }

    /// Claim and process one message. Returns its id and final status, or
    /// `None` when the queue is empty.
    pub async fn process_next(&self) -> Result<Option<(Uuid, MessageStatus)>> {
        let Some(message) = self.queue.claim_next().await? else {
            return Ok(None);
        };
        let status = self.execute(message).await?;
        Ok(Some(status))
    }

    async fn execute(&self, message: AnalysisMessage) -> Result<(Uuid, MessageStatus)> {
        let start = Instant::now();
        let message_id = message.id;

        info!(
            subsystem = "jobs",
            component = "worker",
            %message_id,
            item_count = message.batch.items.len(),
            retry_count = message.retry_count,
            "Processing message"
        );
        let _ = self
            .event_tx
            .send(WorkerEvent::MessageStarted { message_id });

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let result = match tokio::time::timeout(timeout, self.handler.handle(&message)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    subsystem = "jobs",
                    component = "worker",
                    %message_id,
                    "Message exceeded timeout of {}s",
                    self.config.timeout_secs
                );
                MessageResult::Retry(format!(
                    "Message exceeded timeout of {}s",
                    self.config.timeout_secs
                ))
            }
        };

        match result {
            MessageResult::Success(report) => {
                // Lost acknowledgement: requeue for an idempotent rerun.
                if let Err(e) = self.queue.complete(message_id, &report).await {
                    let error = format!("Failed to record completion: {}", e);
                    return self.fail(message_id, error, true, start).await;
                }
                info!(
                    subsystem = "jobs",
                    component = "worker",
                    %message_id,
                    flagged_count = report.flagged.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Message completed"
                );
                let _ = self.event_tx.send(WorkerEvent::MessageCompleted {
                    message_id,
                    flagged_count: report.flagged.len(),
                });
                Ok((message_id, MessageStatus::Completed))
            }
            MessageResult::Failed(error) => self.fail(message_id, error, false, start).await,
            MessageResult::Retry(error) => self.fail(message_id, error, true, start).await,
        }
    }

    async fn fail(
        &self,
        message_id: Uuid,
        error: String,
        retryable: bool,
        start: Instant,
    ) -> Result<(Uuid, MessageStatus)> {
        let status = self.queue.fail(message_id, &error, retryable).await?;
        warn!(
            subsystem = "jobs",
            component = "worker",
            %message_id,
            %error,
            retryable,
            status = status.as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Message failed"
        );
        let _ = self.event_tx.send(WorkerEvent::MessageFailed {
            message_id,
            status,
            error,
        });
        Ok((message_id, status))
    }
}

/// Builder for creating a queue worker.
pub struct WorkerBuilder {
    queue: Arc<dyn AnalysisQueue>,
    handler: Arc<dyn MessageHandler>,
    config: WorkerConfig,
}

impl WorkerBuilder {
    pub fn new(queue: Arc<dyn AnalysisQueue>, handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            queue,
            handler,
            config: WorkerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> AnalysisWorker {
        debug!(
            subsystem = "jobs",
            component = "worker",
            enabled = self.config.enabled,
            "Building queue worker"
        );
        AnalysisWorker::new(self.queue, self.handler, self.config)
    }
}

//! Ingestion queue repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use etalon_core::{
    defaults, AnalysisMessage, AnalysisQueue, BatchReport, Error, InputBatch, MessageStatus,
    Result,
};

const RETURNING_COLUMNS: &str = "id, payload, status, result, error_message, retry_count, \
                                 max_retries, created_at, started_at, completed_at";

/// PostgreSQL implementation of AnalysisQueue.
#[derive(Clone)]
pub struct PgAnalysisQueue {
    pool: Pool<Postgres>,
    max_retries: i32,
    lease_secs: u64,
}

impl PgAnalysisQueue {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            max_retries: defaults::QUEUE_MAX_RETRIES,
            lease_secs: defaults::QUEUE_LEASE_SECS,
        }
    }

    /// Retry budget given to newly enqueued messages.
    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries.max(0);
        self
    }

    /// Age after which a running claim is considered abandoned.
    pub fn with_lease_secs(mut self, lease_secs: u64) -> Self {
        self.lease_secs = lease_secs;
        self
    }

    fn parse_message_row(row: PgRow) -> Result<AnalysisMessage> {
        let payload: Json<InputBatch> = row.try_get("payload").map_err(Error::Database)?;
        let result: Option<Json<BatchReport>> = row.try_get("result").map_err(Error::Database)?;
        let status: String = row.try_get("status").map_err(Error::Database)?;
        Ok(AnalysisMessage {
            id: row.try_get("id").map_err(Error::Database)?,
            batch: payload.0,
            status: status.parse()?,
            result: result.map(|r| r.0),
            error_message: row.try_get("error_message").map_err(Error::Database)?,
            retry_count: row.try_get("retry_count").map_err(Error::Database)?,
            max_retries: row.try_get("max_retries").map_err(Error::Database)?,
            created_at: row.try_get("created_at").map_err(Error::Database)?,
            started_at: row.try_get("started_at").map_err(Error::Database)?,
            completed_at: row.try_get("completed_at").map_err(Error::Database)?,
        })
    }
}

#[async_trait]
impl AnalysisQueue for PgAnalysisQueue {
    async fn enqueue(&self, batch: &InputBatch) -> Result<Uuid> {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO analysis_queue (id, payload, status, retry_count, max_retries, created_at)
             VALUES ($1, $2, 'pending', 0, $3, $4)",
        )
        .bind(id)
        .bind(Json(batch))
        .bind(self.max_retries)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "queue",
            op = "enqueue",
            message_id = %id,
            item_count = batch.items.len(),
            "Analysis batch queued"
        );
        Ok(id)
    }

    async fn claim_next(&self) -> Result<Option<AnalysisMessage>> {
        // SKIP LOCKED lets concurrent workers claim distinct messages.
        let row = sqlx::query(&format!(
            "UPDATE analysis_queue
             SET status = 'running',
                 started_at = $1,
                 retry_count = retry_count + CASE WHEN status = 'running' THEN 1 ELSE 0 END
             WHERE id = (
                 SELECT id FROM analysis_queue
                 WHERE status = 'pending'
                    OR (status = 'running' AND started_at <= $1 - ($2 * INTERVAL '1 second'))
                 ORDER BY created_at ASC, id ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {RETURNING_COLUMNS}"
        ))
        .bind(Utc::now())
        .bind(self.lease_secs as f64)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_message_row).transpose()
    }

    async fn complete(&self, id: Uuid, report: &BatchReport) -> Result<()> {
        let result = sqlx::query(
            "UPDATE analysis_queue
             SET status = 'completed', result = $1, error_message = NULL, completed_at = $2
             WHERE id = $3",
        )
        .bind(Json(report))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("analysis message {}", id)));
        }
        Ok(())
    }

    async fn fail(&self, id: Uuid, error: &str, retryable: bool) -> Result<MessageStatus> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let counts: Option<(i32, i32)> = sqlx::query_as(
            "SELECT retry_count, max_retries FROM analysis_queue WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let (retry_count, max_retries) =
            counts.ok_or_else(|| Error::NotFound(format!("analysis message {}", id)))?;

        let status = if retryable && retry_count < max_retries {
            sqlx::query(
                "UPDATE analysis_queue
                 SET status = 'pending', retry_count = $1, error_message = $2, started_at = NULL
                 WHERE id = $3",
            )
            .bind(retry_count + 1)
            .bind(error)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
            MessageStatus::Pending
        } else {
            sqlx::query(
                "UPDATE analysis_queue
                 SET status = 'failed', error_message = $1, completed_at = $2
                 WHERE id = $3",
            )
            .bind(error)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
            MessageStatus::Failed
        };

        tx.commit().await.map_err(Error::Database)?;

        warn!(
            subsystem = "db",
            component = "queue",
            op = "fail",
            message_id = %id,
            retryable,
            retry_count,
            status = status.as_str(),
            error = error,
            "Analysis message failed"
        );
        Ok(status)
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisMessage>> {
        let row = sqlx::query(&format!(
            "SELECT {RETURNING_COLUMNS} FROM analysis_queue WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_message_row).transpose()
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM analysis_queue WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(count.0)
    }
}

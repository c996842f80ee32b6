//! Reference corpus repository implementation.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info};

use etalon_core::{Error, ReferenceSample, ReferenceStore, Result, SignatureLevel};

const SELECT_COLUMNS: &str = "id, part, order1, order2, order3, weight, theme";

/// PostgreSQL implementation of ReferenceStore.
#[derive(Clone)]
pub struct PgReferenceStore {
    pool: Pool<Postgres>,
}

impl PgReferenceStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_sample_row(row: PgRow) -> Result<ReferenceSample> {
        let order1: Json<SignatureLevel> = row.try_get("order1").map_err(Error::Database)?;
        let order2: Json<SignatureLevel> = row.try_get("order2").map_err(Error::Database)?;
        let order3: Json<SignatureLevel> = row.try_get("order3").map_err(Error::Database)?;
        Ok(ReferenceSample {
            id: row.try_get("id").map_err(Error::Database)?,
            part: row.try_get("part").map_err(Error::Database)?,
            order1: order1.0,
            order2: order2.0,
            order3: order3.0,
            weight: row.try_get("weight").map_err(Error::Database)?,
            theme: row.try_get("theme").map_err(Error::Database)?,
        })
    }

    async fn fetch_samples(&self, theme: Option<&str>) -> Result<Vec<ReferenceSample>> {
        let start = Instant::now();
        let sql = match theme {
            Some(_) => format!(
                "SELECT {SELECT_COLUMNS} FROM reference_samples WHERE theme = $1 ORDER BY id, part"
            ),
            None => format!("SELECT {SELECT_COLUMNS} FROM reference_samples ORDER BY id, part"),
        };
        let mut query = sqlx::query(&sql);
        if let Some(theme) = theme {
            query = query.bind(theme);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(Error::Database)?;

        let samples = rows
            .into_iter()
            .map(Self::parse_sample_row)
            .collect::<Result<Vec<_>>>()?;

        debug!(
            subsystem = "db",
            component = "references",
            op = "load_snapshot",
            theme = theme.unwrap_or(""),
            reference_count = samples.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Loaded reference snapshot"
        );
        Ok(samples)
    }
}

#[async_trait]
impl ReferenceStore for PgReferenceStore {
    async fn get_all(&self) -> Result<Vec<ReferenceSample>> {
        self.fetch_samples(None).await
    }

    async fn get_theme(&self, theme: &str) -> Result<Vec<ReferenceSample>> {
        self.fetch_samples(Some(theme)).await
    }

    async fn upsert_all(&self, samples: &[ReferenceSample]) -> Result<u64> {
        if samples.is_empty() {
            return Ok(0);
        }
        let start = Instant::now();
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut changed = 0u64;

        for sample in samples {
            // Rows whose content is unchanged are left untouched.
            let result = sqlx::query(
                "INSERT INTO reference_samples
                     (id, part, order1, order2, order3, weight, theme, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
                 ON CONFLICT (id, part) DO UPDATE
                 SET order1 = EXCLUDED.order1,
                     order2 = EXCLUDED.order2,
                     order3 = EXCLUDED.order3,
                     weight = EXCLUDED.weight,
                     theme = EXCLUDED.theme,
                     updated_at = EXCLUDED.updated_at
                 WHERE (reference_samples.order1, reference_samples.order2, reference_samples.order3,
                        reference_samples.weight, reference_samples.theme)
                       IS DISTINCT FROM
                       (EXCLUDED.order1, EXCLUDED.order2, EXCLUDED.order3,
                        EXCLUDED.weight, EXCLUDED.theme)",
            )
            .bind(sample.id)
            .bind(sample.part)
            .bind(Json(&sample.order1))
            .bind(Json(&sample.order2))
            .bind(Json(&sample.order3))
            .bind(sample.weight)
            .bind(sample.theme.as_deref())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
            changed += result.rows_affected();
        }

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "references",
            op = "persist",
            item_count = samples.len(),
            changed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Upserted reference samples"
        );
        Ok(changed)
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("TRUNCATE reference_samples")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        info!(
            subsystem = "db",
            component = "references",
            op = "clear",
            "Reference corpus cleared"
        );
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reference_samples")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count.0)
    }
}

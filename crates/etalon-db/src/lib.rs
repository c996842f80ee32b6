//! # etalon-db
//!
//! PostgreSQL persistence for etalon.
//!
//! This crate provides:
//! - Connection pool management
//! - The reference corpus store (`reference_samples`)
//! - The durable ingestion queue (`analysis_queue`)
//! - In-memory implementations of both for tests and embedding
//!
//! ## Example
//!
//! ```rust,ignore
//! use etalon_db::{Database, DatabaseConfig, ReferenceStore};
//!
//! let db = Database::connect(&DatabaseConfig::from_env().url()).await?;
//! db.migrate().await?;
//! let corpus = db.references.get_all().await?;
//! ```

pub mod memory;
pub mod pool;
pub mod queue;
pub mod references;

// Always compiled so integration tests (in tests/) can use the fixtures.
pub mod test_fixtures;

// Re-export core types
pub use etalon_core::*;

pub use memory::{InMemoryAnalysisQueue, InMemoryReferenceStore};
pub use pool::{
    create_pool, create_pool_with_config, log_pool_metrics, DatabaseConfig, PoolConfig,
};
pub use queue::PgAnalysisQueue;
pub use references::PgReferenceStore;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Reference corpus store.
    pub references: PgReferenceStore,
    /// Ingestion queue.
    pub queue: PgAnalysisQueue,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            references: PgReferenceStore::new(pool.clone()),
            queue: PgAnalysisQueue::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Set the retry budget of newly queued messages.
    pub fn with_queue_max_retries(mut self, max_retries: i32) -> Self {
        self.queue = self.queue.with_max_retries(max_retries);
        self
    }

    /// Set the age after which an abandoned running message is reclaimed.
    pub fn with_queue_lease_secs(mut self, lease_secs: u64) -> Self {
        self.queue = self.queue.with_lease_secs(lease_secs);
        self
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

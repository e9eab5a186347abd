use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use trawler_core::ScrapeError;

use crate::config::DatabaseConfig;
use crate::job_store::PgJobStore;
use crate::record_store::PgDataStore;

/// Central database facade — owns the connection pool, runs migrations,
/// and vends store instances.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL with the given configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, ScrapeError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| ScrapeError::Storage(format!("Failed to connect: {e}")))?;

        Ok(Self { pool })
    }

    /// Create a `Database` from an existing pool (useful for testing).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<(), ScrapeError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ScrapeError::Storage(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), ScrapeError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| ScrapeError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Get a [`PgJobStore`] backed by this pool.
    pub fn job_store(&self) -> PgJobStore {
        PgJobStore::new(self.pool.clone())
    }

    /// Get a [`PgDataStore`] backed by this pool.
    pub fn data_store(&self) -> PgDataStore {
        PgDataStore::new(self.pool.clone())
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use trawler_core::error::ScrapeError;
use trawler_core::job::{JobStatus, ScraperJob};
use trawler_core::traits::JobStore;

/// PostgreSQL-backed [`JobStore`].
///
/// State transitions are conditional `UPDATE ... WHERE status = ...`
/// statements, so concurrent writers (a job task racing a cancel request)
/// cannot resurrect a terminal job.
#[derive(Clone)]
pub struct PgJobStore {
    pool: Pool<Postgres>,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    name: String,
    description: String,
    target_urls: Vec<String>,
    scraping_rules: serde_json::Value,
    data_storage: serde_json::Value,
    schedule: Option<String>,
    rate_limit: Option<f64>,
    status: String,
    progress: f64,
    pages_scraped: i32,
    total_pages: i32,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    is_active: bool,
}

impl TryFrom<JobRow> for ScraperJob {
    type Error = ScrapeError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let scraping_rules = serde_json::from_value(row.scraping_rules)
            .map_err(|e| ScrapeError::Storage(format!("corrupt scraping_rules: {e}")))?;
        Ok(ScraperJob {
            id: row.id,
            name: row.name,
            description: row.description,
            target_urls: row.target_urls,
            scraping_rules,
            data_storage: row.data_storage,
            schedule: row.schedule,
            rate_limit: row.rate_limit,
            status: row.status.parse().unwrap_or(JobStatus::Pending),
            progress: row.progress,
            pages_scraped: row.pages_scraped as u32,
            total_pages: row.total_pages as u32,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
            is_active: row.is_active,
        })
    }
}

fn db_err(e: sqlx::Error) -> ScrapeError {
    ScrapeError::Storage(e.to_string())
}

impl JobStore for PgJobStore {
    async fn insert(&self, job: &ScraperJob) -> Result<(), ScrapeError> {
        sqlx::query(
            r#"
            INSERT INTO scraper_jobs (
                id, name, description, target_urls, scraping_rules, data_storage,
                schedule, rate_limit, status, progress, pages_scraped, total_pages,
                created_at, started_at, completed_at, error_message, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(job.id)
        .bind(&job.name)
        .bind(&job.description)
        .bind(&job.target_urls)
        .bind(serde_json::to_value(&job.scraping_rules)?)
        .bind(&job.data_storage)
        .bind(&job.schedule)
        .bind(job.rate_limit)
        .bind(job.status.as_str())
        .bind(job.progress)
        .bind(job.pages_scraped as i32)
        .bind(job.total_pages as i32)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(&job.error_message)
        .bind(job.is_active)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn update(&self, job: &ScraperJob) -> Result<(), ScrapeError> {
        sqlx::query(
            r#"
            UPDATE scraper_jobs
            SET name = $2, description = $3, target_urls = $4, scraping_rules = $5,
                data_storage = $6, schedule = $7, rate_limit = $8, status = $9,
                progress = $10, pages_scraped = $11, total_pages = $12,
                started_at = $13, completed_at = $14, error_message = $15, is_active = $16
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(&job.name)
        .bind(&job.description)
        .bind(&job.target_urls)
        .bind(serde_json::to_value(&job.scraping_rules)?)
        .bind(&job.data_storage)
        .bind(&job.schedule)
        .bind(job.rate_limit)
        .bind(job.status.as_str())
        .bind(job.progress)
        .bind(job.pages_scraped as i32)
        .bind(job.total_pages as i32)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(&job.error_message)
        .bind(job.is_active)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn mark_running(&self, job_id: Uuid) -> Result<bool, ScrapeError> {
        let result = sqlx::query(
            r#"
            UPDATE scraper_jobs
            SET status = 'running', started_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_progress(
        &self,
        job_id: Uuid,
        pages_scraped: u32,
        progress: f64,
    ) -> Result<(), ScrapeError> {
        sqlx::query(
            r#"
            UPDATE scraper_jobs
            SET pages_scraped = $2, progress = $3
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(pages_scraped as i32)
        .bind(progress)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn complete_job(&self, job_id: Uuid) -> Result<bool, ScrapeError> {
        let result = sqlx::query(
            r#"
            UPDATE scraper_jobs
            SET status = 'completed', completed_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn fail_job(&self, job_id: Uuid, error: &str) -> Result<bool, ScrapeError> {
        let result = sqlx::query(
            r#"
            UPDATE scraper_jobs
            SET status = 'failed', error_message = $2, completed_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn cancel_job(&self, job_id: Uuid) -> Result<bool, ScrapeError> {
        let result = sqlx::query(
            r#"
            UPDATE scraper_jobs
            SET status = 'cancelled', completed_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn deactivate(&self, job_id: Uuid) -> Result<bool, ScrapeError> {
        let result = sqlx::query(
            r#"
            UPDATE scraper_jobs
            SET is_active = FALSE
            WHERE id = $1 AND status <> 'running' AND is_active
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<ScraperJob>, ScrapeError> {
        let row = sqlx::query_as::<_, JobRow>(r#"SELECT * FROM scraper_jobs WHERE id = $1"#)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ScraperJob>, ScrapeError> {
        let rows = if let Some(status) = status {
            sqlx::query_as::<_, JobRow>(
                r#"
                SELECT * FROM scraper_jobs
                WHERE is_active AND status = $1
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(status.as_str())
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, JobRow>(
                r#"
                SELECT * FROM scraper_jobs
                WHERE is_active
                ORDER BY created_at DESC
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(db_err)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count(&self, status: Option<JobStatus>) -> Result<u64, ScrapeError> {
        let (count,): (i64,) = if let Some(status) = status {
            sqlx::query_as(
                r#"SELECT COUNT(*) FROM scraper_jobs WHERE is_active AND status = $1"#,
            )
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
        } else {
            sqlx::query_as(r#"SELECT COUNT(*) FROM scraper_jobs WHERE is_active"#)
                .fetch_one(&self.pool)
                .await
        }
        .map_err(db_err)?;

        Ok(count as u64)
    }
}

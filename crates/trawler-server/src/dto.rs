use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use trawler_core::job::ScraperJob;
use trawler_core::manager::EngineStats;
use trawler_core::record::{RecordMetadata, ScrapedRecord};
use trawler_core::rule::ScrapingRule;

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateJobRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Scraped in order; must be non-empty.
    pub target_urls: Vec<String>,
    #[schema(value_type = Vec<Object>)]
    pub scraping_rules: Vec<ScrapingRule>,
    /// Opaque downstream storage configuration.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data_storage: serde_json::Value,
    #[serde(default)]
    pub schedule: Option<String>,
    /// Requests per second; must be positive when given.
    #[serde(default)]
    pub rate_limit: Option<f64>,
}

impl From<CreateJobRequest> for trawler_core::job::CreateJobRequest {
    fn from(body: CreateJobRequest) -> Self {
        Self {
            name: body.name,
            description: body.description,
            target_urls: body.target_urls,
            scraping_rules: body.scraping_rules,
            data_storage: body.data_storage,
            schedule: body.schedule,
            rate_limit: body.rate_limit,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateJobRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub target_urls: Option<Vec<String>>,
    #[schema(value_type = Option<Vec<Object>>)]
    pub scraping_rules: Option<Vec<ScrapingRule>>,
    #[schema(value_type = Option<Object>)]
    pub data_storage: Option<serde_json::Value>,
    pub schedule: Option<String>,
    pub rate_limit: Option<f64>,
}

impl From<UpdateJobRequest> for trawler_core::job::UpdateJobRequest {
    fn from(body: UpdateJobRequest) -> Self {
        Self {
            name: body.name,
            description: body.description,
            target_urls: body.target_urls,
            scraping_rules: body.scraping_rules,
            data_storage: body.data_storage,
            schedule: body.schedule,
            rate_limit: body.rate_limit,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct JobResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub target_urls: Vec<String>,
    #[schema(value_type = Vec<Object>)]
    pub scraping_rules: Vec<ScrapingRule>,
    #[schema(value_type = Object)]
    pub data_storage: serde_json::Value,
    pub schedule: Option<String>,
    pub rate_limit: Option<f64>,
    pub status: String,
    pub progress: f64,
    pub pages_scraped: u32,
    pub total_pages: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl From<ScraperJob> for JobResponse {
    fn from(job: ScraperJob) -> Self {
        Self {
            id: job.id,
            name: job.name,
            description: job.description,
            target_urls: job.target_urls,
            scraping_rules: job.scraping_rules,
            data_storage: job.data_storage,
            schedule: job.schedule,
            rate_limit: job.rate_limit,
            status: job.status.to_string(),
            progress: job.progress,
            pages_scraped: job.pages_scraped,
            total_pages: job.total_pages,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            error_message: job.error_message,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListJobsQuery {
    /// Filter by job status (pending, running, completed, failed, cancelled).
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ExecuteJobResponse {
    pub job_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CancelJobResponse {
    pub job_id: Uuid,
    /// False when the job was not running; its status is left unchanged.
    pub cancelled: bool,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListRecordsQuery {
    pub job_id: Option<Uuid>,
    pub url: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RecordMetadataResponse {
    pub job_id: Uuid,
    pub url: String,
    pub data_size: usize,
    pub content_hash: String,
}

impl From<RecordMetadata> for RecordMetadataResponse {
    fn from(meta: RecordMetadata) -> Self {
        Self {
            job_id: meta.job_id,
            url: meta.url,
            data_size: meta.data_size,
            content_hash: meta.content_hash,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RecordResponse {
    pub id: Uuid,
    pub job_id: Uuid,
    pub url: String,
    pub scraped_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    pub metadata: RecordMetadataResponse,
}

impl From<ScrapedRecord> for RecordResponse {
    fn from(record: ScrapedRecord) -> Self {
        Self {
            id: record.id,
            job_id: record.job_id,
            url: record.url,
            scraped_at: record.scraped_at,
            data: record.data,
            metadata: record.metadata.into(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RecordListResponse {
    pub records: Vec<RecordResponse>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

// ---------------------------------------------------------------------------
// Stats & Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StatsResponse {
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub total_jobs: u64,
    pub total_records: u64,
}

impl From<EngineStats> for StatsResponse {
    fn from(stats: EngineStats) -> Self {
        Self {
            pending: stats.pending,
            running: stats.running,
            completed: stats.completed,
            failed: stats.failed,
            cancelled: stats.cancelled,
            total_jobs: stats.total_jobs,
            total_records: stats.total_records,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScrapeError;
use crate::rule::{ScrapingRule, validate_rules};

/// Delay between consecutive page fetches when a job carries no explicit
/// rate limit.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(1);

/// Status of a scraper job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// A declarative scraping job: an ordered list of target URLs plus the
/// extraction rules applied to each of them.
///
/// Lifecycle fields are only ever mutated through the
/// [`JobManager`](crate::manager::JobManager); once a job reaches a terminal
/// status it is read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperJob {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Visited in order; order defines scrape order.
    pub target_urls: Vec<String>,
    pub scraping_rules: Vec<ScrapingRule>,
    /// Opaque downstream storage configuration. Carried, never interpreted.
    pub data_storage: serde_json::Value,
    /// Optional cron-like schedule. Stored only; execution is always explicit.
    pub schedule: Option<String>,
    /// Maximum requests per second. `None` falls back to
    /// [`DEFAULT_REQUEST_DELAY`].
    pub rate_limit: Option<f64>,
    pub status: JobStatus,
    /// `pages_scraped / total_pages`, monotonically non-decreasing while
    /// running.
    pub progress: f64,
    pub pages_scraped: u32,
    pub total_pages: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Soft-delete flag; deactivated jobs are hidden from reads.
    pub is_active: bool,
}

impl ScraperJob {
    /// Build a pending job from a validated request.
    pub fn new(request: CreateJobRequest) -> Self {
        let total_pages = request.target_urls.len() as u32;
        Self {
            id: Uuid::new_v4(),
            name: request.name,
            description: request.description,
            target_urls: request.target_urls,
            scraping_rules: request.scraping_rules,
            data_storage: request.data_storage,
            schedule: request.schedule,
            rate_limit: request.rate_limit,
            status: JobStatus::Pending,
            progress: 0.0,
            pages_scraped: 0,
            total_pages,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            is_active: true,
        }
    }

    pub fn start(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error_message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error_message = Some(error_message.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn cancel(&mut self) {
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    /// Count one successfully scraped page and recompute progress.
    pub fn record_page(&mut self) {
        self.pages_scraped += 1;
        self.progress = f64::from(self.pages_scraped) / f64::from(self.total_pages);
    }

    /// Inter-request delay implied by the job's rate limit.
    pub fn request_delay(&self) -> Duration {
        match self.rate_limit {
            Some(per_second) => Duration::from_secs_f64(1.0 / per_second),
            None => DEFAULT_REQUEST_DELAY,
        }
    }

    /// Apply a partial update and re-validate the affected fields.
    ///
    /// Replacing `target_urls` resets the page counters, since the old
    /// progress no longer refers to the new URL list.
    pub fn apply_update(&mut self, update: UpdateJobRequest) -> Result<(), ScrapeError> {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(target_urls) = update.target_urls {
            if target_urls.is_empty() {
                return Err(ScrapeError::Validation(
                    "target_urls must not be empty".into(),
                ));
            }
            self.total_pages = target_urls.len() as u32;
            self.target_urls = target_urls;
            self.pages_scraped = 0;
            self.progress = 0.0;
        }
        if let Some(scraping_rules) = update.scraping_rules {
            validate_rules(&scraping_rules)?;
            self.scraping_rules = scraping_rules;
        }
        if let Some(data_storage) = update.data_storage {
            self.data_storage = data_storage;
        }
        if let Some(schedule) = update.schedule {
            self.schedule = Some(schedule);
        }
        if let Some(rate_limit) = update.rate_limit {
            if rate_limit <= 0.0 {
                return Err(ScrapeError::Validation(
                    "rate_limit must be positive".into(),
                ));
            }
            self.rate_limit = Some(rate_limit);
        }
        Ok(())
    }
}

/// Request to create a new scraper job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub target_urls: Vec<String>,
    pub scraping_rules: Vec<ScrapingRule>,
    #[serde(default)]
    pub data_storage: serde_json::Value,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub rate_limit: Option<f64>,
}

impl CreateJobRequest {
    pub fn new(
        name: impl Into<String>,
        target_urls: Vec<String>,
        scraping_rules: Vec<ScrapingRule>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            target_urls,
            scraping_rules,
            data_storage: serde_json::Value::Null,
            schedule: None,
            rate_limit: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_rate_limit(mut self, per_second: f64) -> Self {
        self.rate_limit = Some(per_second);
        self
    }

    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    /// Reject definitions that could never run: no targets, non-positive
    /// rate limit, duplicate rule names, or rules that fail to compile.
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.target_urls.is_empty() {
            return Err(ScrapeError::Validation(
                "target_urls must not be empty".into(),
            ));
        }
        if let Some(rate_limit) = self.rate_limit {
            if rate_limit <= 0.0 {
                return Err(ScrapeError::Validation(
                    "rate_limit must be positive".into(),
                ));
            }
        }
        validate_rules(&self.scraping_rules)
    }
}

/// Partial update of a job's definition; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateJobRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub target_urls: Option<Vec<String>>,
    pub scraping_rules: Option<Vec<ScrapingRule>>,
    pub data_storage: Option<serde_json::Value>,
    pub schedule: Option<String>,
    pub rate_limit: Option<f64>,
}

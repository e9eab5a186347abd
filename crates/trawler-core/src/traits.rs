use std::future::Future;

use uuid::Uuid;

use crate::error::ScrapeError;
use crate::job::{JobStatus, ScraperJob};
use crate::record::{NewRecord, ScrapedRecord};

/// Fetches the raw body of a URL.
///
/// Implementations own timeout and User-Agent policy; a non-2xx response
/// surfaces as [`ScrapeError::HttpStatus`].
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, ScrapeError>> + Send;
}

/// Filter + pagination for record queries.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub job_id: Option<Uuid>,
    pub url: Option<String>,
    /// 0 means no limit.
    pub limit: usize,
    pub offset: usize,
}

impl RecordQuery {
    pub fn for_job(job_id: Uuid) -> Self {
        Self {
            job_id: Some(job_id),
            ..Self::default()
        }
    }
}

/// Persistence for job metadata and state transitions.
///
/// The transition methods (`mark_running`, `complete_job`, `fail_job`,
/// `cancel_job`) are conditional on the current status and report whether
/// they took effect, so concurrent writers cannot resurrect a terminal job.
/// `record_progress` never touches status. Implementations must be safe for
/// concurrent use from many job tasks.
pub trait JobStore: Send + Sync + Clone {
    fn insert(&self, job: &ScraperJob) -> impl Future<Output = Result<(), ScrapeError>> + Send;

    /// Full-row update. Used by the CRUD update path for jobs that are not
    /// running; execution state is driven through the transition methods.
    fn update(&self, job: &ScraperJob) -> impl Future<Output = Result<(), ScrapeError>> + Send;

    /// Transition pending → running. Returns false if the job was not pending.
    fn mark_running(&self, job_id: Uuid)
    -> impl Future<Output = Result<bool, ScrapeError>> + Send;

    /// Persist the per-page counters of a running job.
    fn record_progress(
        &self,
        job_id: Uuid,
        pages_scraped: u32,
        progress: f64,
    ) -> impl Future<Output = Result<(), ScrapeError>> + Send;

    /// Transition running → completed. Returns false unless the job was running.
    fn complete_job(&self, job_id: Uuid)
    -> impl Future<Output = Result<bool, ScrapeError>> + Send;

    /// Transition running → failed, recording the error. Returns false unless
    /// the job was running.
    fn fail_job(
        &self,
        job_id: Uuid,
        error: &str,
    ) -> impl Future<Output = Result<bool, ScrapeError>> + Send;

    /// Transition running → cancelled. Returns false unless the job was running.
    fn cancel_job(&self, job_id: Uuid)
    -> impl Future<Output = Result<bool, ScrapeError>> + Send;

    /// Soft-delete. Returns false if the job is unknown or currently running.
    fn deactivate(&self, job_id: Uuid)
    -> impl Future<Output = Result<bool, ScrapeError>> + Send;

    fn get(
        &self,
        job_id: Uuid,
    ) -> impl Future<Output = Result<Option<ScraperJob>, ScrapeError>> + Send;

    /// Active jobs, newest first.
    fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<ScraperJob>, ScrapeError>> + Send;

    /// Count of active jobs, optionally restricted to one status.
    fn count(
        &self,
        status: Option<JobStatus>,
    ) -> impl Future<Output = Result<u64, ScrapeError>> + Send;
}

/// Append-only store of extracted records, queryable by job and URL.
pub trait DataStore: Send + Sync + Clone {
    /// Append a record. Returns the generated id.
    fn append(&self, record: &NewRecord)
    -> impl Future<Output = Result<Uuid, ScrapeError>> + Send;

    fn get(
        &self,
        record_id: Uuid,
    ) -> impl Future<Output = Result<Option<ScrapedRecord>, ScrapeError>> + Send;

    /// Matching records, newest first.
    fn query(
        &self,
        query: &RecordQuery,
    ) -> impl Future<Output = Result<Vec<ScrapedRecord>, ScrapeError>> + Send;

    /// Count of matching records, ignoring pagination.
    fn count(&self, query: &RecordQuery)
    -> impl Future<Output = Result<u64, ScrapeError>> + Send;
}

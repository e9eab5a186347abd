use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::engine::ScraperEngine;
use crate::error::ScrapeError;
use crate::job::{CreateJobRequest, JobStatus, ScraperJob, UpdateJobRequest};
use crate::record::{NewRecord, ScrapedRecord};
use crate::traits::{DataStore, Fetcher, JobStore, RecordQuery};

/// Aggregate counts reported by [`JobManager::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub total_jobs: u64,
    pub total_records: u64,
}

/// Handle to a job execution started by [`JobManager::execute_job`].
///
/// Execution is detached: dropping the handle does not stop the job.
/// [`wait`](Self::wait) is for callers (tests, the CLI) that want to block
/// until the execution task finishes.
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: Uuid,
    join: JoinHandle<()>,
}

impl JobHandle {
    pub async fn wait(self) {
        let _ = self.join.await;
    }
}

/// Owns the job lifecycle: validation, asynchronous execution under a rate
/// budget, cooperative cancellation, and queries.
///
/// Cloning is cheap; all clones share the same stores and the same view of
/// running jobs. Each execution runs in its own tokio task and visits the
/// job's `target_urls` strictly in order, one in-flight request at a time.
pub struct JobManager<F, J, D>
where
    F: Fetcher,
    J: JobStore,
    D: DataStore,
{
    engine: ScraperEngine<F>,
    jobs: J,
    data: D,
    running: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl<F, J, D> Clone for JobManager<F, J, D>
where
    F: Fetcher,
    J: JobStore,
    D: DataStore,
{
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            jobs: self.jobs.clone(),
            data: self.data.clone(),
            running: Arc::clone(&self.running),
        }
    }
}

impl<F, J, D> JobManager<F, J, D>
where
    F: Fetcher + 'static,
    J: JobStore + 'static,
    D: DataStore + 'static,
{
    pub fn new(fetcher: F, jobs: J, data: D) -> Self {
        Self {
            engine: ScraperEngine::new(fetcher),
            jobs,
            data,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Validate and persist a new job. Nothing is stored on validation failure.
    pub async fn create_job(&self, request: CreateJobRequest) -> Result<ScraperJob, ScrapeError> {
        request.validate()?;
        let job = ScraperJob::new(request);
        self.jobs.insert(&job).await?;
        tracing::info!(job_id = %job.id, pages = job.total_pages, "job created");
        Ok(job)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<ScraperJob, ScrapeError> {
        self.require_job(job_id).await
    }

    /// Active jobs, newest first, plus the total count for pagination.
    pub async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<ScraperJob>, u64), ScrapeError> {
        let jobs = self.jobs.list(status, limit, offset).await?;
        let total = self.jobs.count(status).await?;
        Ok((jobs, total))
    }

    /// Start asynchronous execution of a pending job and return immediately.
    ///
    /// Fails with [`ScrapeError::InvalidState`] unless the job is pending;
    /// a terminal job cannot be re-executed.
    pub async fn execute_job(&self, job_id: Uuid) -> Result<JobHandle, ScrapeError> {
        let mut job = self.require_job(job_id).await?;
        if job.status != JobStatus::Pending {
            return Err(ScrapeError::InvalidState(format!(
                "job {job_id} cannot be executed from status '{}'",
                job.status
            )));
        }

        let token = {
            let mut running = self.running.lock().await;
            if running.contains_key(&job_id) {
                return Err(ScrapeError::InvalidState(format!(
                    "job {job_id} is already running"
                )));
            }
            if !self.jobs.mark_running(job_id).await? {
                return Err(ScrapeError::InvalidState(format!(
                    "job {job_id} is no longer pending"
                )));
            }
            let token = CancellationToken::new();
            running.insert(job_id, token.clone());
            token
        };
        job.start();

        let manager = self.clone();
        let join = tokio::spawn(async move {
            manager.run_job(job, token).await;
        });

        Ok(JobHandle { job_id, join })
    }

    /// Best-effort cancellation. Returns true only if the job was running;
    /// any other status is left untouched.
    ///
    /// The running task observes cancellation between URLs, so already
    /// in-flight work for the current page finishes first. Records scraped
    /// so far are retained.
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<bool, ScrapeError> {
        let job = self.require_job(job_id).await?;
        if job.status != JobStatus::Running {
            return Ok(false);
        }

        let cancelled = self.jobs.cancel_job(job_id).await?;
        if cancelled {
            if let Some(token) = self.running.lock().await.get(&job_id) {
                token.cancel();
            }
            tracing::info!(%job_id, "job cancelled");
        }
        Ok(cancelled)
    }

    /// Update a job's definition. Refused while the job is running or
    /// completed.
    pub async fn update_job(
        &self,
        job_id: Uuid,
        update: UpdateJobRequest,
    ) -> Result<ScraperJob, ScrapeError> {
        let mut job = self.require_job(job_id).await?;
        if matches!(job.status, JobStatus::Running | JobStatus::Completed) {
            return Err(ScrapeError::InvalidState(format!(
                "job {job_id} cannot be updated in status '{}'",
                job.status
            )));
        }
        job.apply_update(update)?;
        self.jobs.update(&job).await?;
        Ok(job)
    }

    /// Soft-delete a job. Refused while the job is running. Its records are
    /// kept; deletion does not cascade.
    pub async fn delete_job(&self, job_id: Uuid) -> Result<(), ScrapeError> {
        let job = self.require_job(job_id).await?;
        if job.status == JobStatus::Running {
            return Err(ScrapeError::InvalidState(format!(
                "job {job_id} cannot be deleted while running"
            )));
        }
        if !self.jobs.deactivate(job_id).await? {
            return Err(ScrapeError::InvalidState(format!(
                "job {job_id} cannot be deleted while running"
            )));
        }
        tracing::info!(%job_id, "job deleted");
        Ok(())
    }

    /// Matching records, newest first, plus the total count.
    pub async fn records(
        &self,
        query: &RecordQuery,
    ) -> Result<(Vec<ScrapedRecord>, u64), ScrapeError> {
        let records = self.data.query(query).await?;
        let total = self.data.count(query).await?;
        Ok((records, total))
    }

    pub async fn get_record(&self, record_id: Uuid) -> Result<ScrapedRecord, ScrapeError> {
        self.data
            .get(record_id)
            .await?
            .ok_or_else(|| ScrapeError::NotFound(format!("record {record_id}")))
    }

    pub async fn stats(&self) -> Result<EngineStats, ScrapeError> {
        let pending = self.jobs.count(Some(JobStatus::Pending)).await?;
        let running = self.jobs.count(Some(JobStatus::Running)).await?;
        let completed = self.jobs.count(Some(JobStatus::Completed)).await?;
        let failed = self.jobs.count(Some(JobStatus::Failed)).await?;
        let cancelled = self.jobs.count(Some(JobStatus::Cancelled)).await?;
        let total_records = self.data.count(&RecordQuery::default()).await?;
        Ok(EngineStats {
            pending,
            running,
            completed,
            failed,
            cancelled,
            total_jobs: pending + running + completed + failed + cancelled,
            total_records,
        })
    }

    async fn require_job(&self, job_id: Uuid) -> Result<ScraperJob, ScrapeError> {
        match self.jobs.get(job_id).await? {
            Some(job) if job.is_active => Ok(job),
            _ => Err(ScrapeError::NotFound(format!("job {job_id}"))),
        }
    }

    /// Body of the per-job execution task.
    async fn run_job(&self, mut job: ScraperJob, token: CancellationToken) {
        tracing::info!(job_id = %job.id, urls = job.total_pages, "job execution started");

        match self.scrape_all(&mut job, &token).await {
            Ok(()) => {
                if token.is_cancelled() {
                    // Terminal state was already written by cancel_job.
                    tracing::info!(job_id = %job.id, scraped = job.pages_scraped, "job stopped after cancellation");
                } else {
                    match self.jobs.complete_job(job.id).await {
                        Ok(true) => {
                            tracing::info!(job_id = %job.id, scraped = job.pages_scraped, "job completed");
                        }
                        Ok(false) => {
                            tracing::warn!(job_id = %job.id, "job left running state before completion");
                        }
                        Err(e) => {
                            tracing::error!(job_id = %job.id, error = %e, "failed to persist job completion");
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "job failed");
                if let Err(update_err) = self.jobs.fail_job(job.id, &e.to_string()).await {
                    tracing::error!(job_id = %job.id, error = %update_err, "failed to persist job failure");
                }
            }
        }

        self.running.lock().await.remove(&job.id);
    }

    /// Visit every target URL in order under the job's rate budget.
    ///
    /// Per-URL failures are logged and skipped; a store failure is fatal and
    /// propagates. Returns Ok both on natural completion and when stopped by
    /// cancellation (the caller distinguishes via the token).
    async fn scrape_all(
        &self,
        job: &mut ScraperJob,
        token: &CancellationToken,
    ) -> Result<(), ScrapeError> {
        let delay = job.request_delay();
        let urls = job.target_urls.clone();

        for (index, url) in urls.iter().enumerate() {
            if token.is_cancelled() {
                tracing::info!(
                    job_id = %job.id,
                    remaining = urls.len() - index,
                    "cancellation observed between pages"
                );
                return Ok(());
            }

            match self.engine.scrape(url, &job.scraping_rules).await {
                Ok(page) => {
                    let record = NewRecord {
                        job_id: job.id,
                        url: url.clone(),
                        data_size: page.data.to_string().len(),
                        data: page.data,
                        content_hash: page.content_hash,
                    };
                    self.data.append(&record).await?;
                    job.record_page();
                    self.jobs
                        .record_progress(job.id, job.pages_scraped, job.progress)
                        .await?;
                }
                Err(e) if e.is_per_url() => {
                    tracing::warn!(job_id = %job.id, %url, error = %e, "page skipped");
                }
                Err(e) => return Err(e),
            }

            if index + 1 < urls.len() {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = token.cancelled() => {}
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::memory::{InMemoryDataStore, InMemoryJobStore};
    use crate::rule::{DataType, ScrapingRule};
    use crate::testutil::{FailingDataStore, MockFetcher};

    type TestManager<D = InMemoryDataStore> = JobManager<MockFetcher, InMemoryJobStore, D>;

    fn manager(fetcher: MockFetcher) -> TestManager {
        JobManager::new(fetcher, InMemoryJobStore::new(), InMemoryDataStore::new())
    }

    fn request(urls: &[&str]) -> CreateJobRequest {
        CreateJobRequest::new(
            "manager test",
            urls.iter().map(|u| u.to_string()).collect(),
            vec![
                ScrapingRule::new("title", "h1", DataType::Text),
                ScrapingRule::new("links", "a", DataType::Link),
            ],
        )
    }

    const PAGE: &str = r#"<h1>Title</h1><a href="/next">next</a>"#;

    #[tokio::test]
    async fn create_job_rejects_empty_urls_and_persists_nothing() {
        let m = manager(MockFetcher::new(PAGE));
        let err = m.create_job(request(&[])).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Validation(_)));
        assert_eq!(m.stats().await.unwrap().total_jobs, 0);
    }

    #[tokio::test]
    async fn create_job_rejects_bad_rate_limit() {
        let m = manager(MockFetcher::new(PAGE));
        let err = m
            .create_job(request(&["https://example.com"]).with_rate_limit(-1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Validation(_)));
    }

    #[tokio::test]
    async fn execute_scrapes_every_url_in_order() {
        let fetcher = MockFetcher::new(PAGE);
        let m = manager(fetcher.clone());
        let job = m
            .create_job(request(&["https://a.example", "https://b.example"]).with_rate_limit(1000.0))
            .await
            .unwrap();

        m.execute_job(job.id).await.unwrap().wait().await;

        assert_eq!(
            fetcher.calls(),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );

        let finished = m.get_job(job.id).await.unwrap();
        assert_eq!(finished.status, JobStatus::Completed);
        assert_eq!(finished.pages_scraped, 2);
        assert!((finished.progress - 1.0).abs() < f64::EPSILON);
        assert!(finished.completed_at.is_some());

        let (records, total) = m.records(&RecordQuery::for_job(job.id)).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(records[0].data["title"], serde_json::json!(["Title"]));
        assert_eq!(records[0].metadata.content_hash.len(), 64);
    }

    #[tokio::test]
    async fn one_failing_url_does_not_fail_the_job() {
        let fetcher = MockFetcher::with_responses(vec![
            Ok(PAGE.to_string()),
            Err(ScrapeError::HttpStatus {
                status: 500,
                url: "https://b.example".into(),
            }),
            Ok(PAGE.to_string()),
        ]);
        let m = manager(fetcher);
        let job = m
            .create_job(
                request(&["https://a.example", "https://b.example", "https://c.example"])
                    .with_rate_limit(1000.0),
            )
            .await
            .unwrap();

        m.execute_job(job.id).await.unwrap().wait().await;

        let finished = m.get_job(job.id).await.unwrap();
        assert_eq!(finished.status, JobStatus::Completed);
        assert_eq!(finished.pages_scraped, 2);
        assert!((finished.progress - 2.0 / 3.0).abs() < 1e-9);

        let (_, total) = m.records(&RecordQuery::for_job(job.id)).await.unwrap();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn execute_rejects_non_pending_jobs() {
        let m = manager(MockFetcher::new(PAGE));
        let job = m
            .create_job(request(&["https://a.example"]).with_rate_limit(1000.0))
            .await
            .unwrap();

        m.execute_job(job.id).await.unwrap().wait().await;

        // Completed jobs cannot be re-executed.
        let err = m.execute_job(job.id).await.unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidState(_)));
    }

    #[tokio::test]
    async fn execute_rejects_already_running_job() {
        // Default 1s inter-request delay keeps the first run alive.
        let m = manager(MockFetcher::new(PAGE));
        let job = m
            .create_job(request(&["https://a.example", "https://b.example"]))
            .await
            .unwrap();

        let handle = m.execute_job(job.id).await.unwrap();
        let err = m.execute_job(job.id).await.unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidState(_)));

        assert!(m.cancel_job(job.id).await.unwrap());
        handle.wait().await;
    }

    #[tokio::test]
    async fn execute_unknown_job_is_not_found() {
        let m = manager(MockFetcher::new(PAGE));
        let err = m.execute_job(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ScrapeError::NotFound(_)));
    }

    #[tokio::test]
    async fn cancel_running_job_stops_remaining_urls_and_keeps_records() {
        let m = manager(MockFetcher::new(PAGE));
        // Default delay (1s) between pages leaves a wide cancellation window.
        let job = m
            .create_job(request(&[
                "https://a.example",
                "https://b.example",
                "https://c.example",
            ]))
            .await
            .unwrap();

        let handle = m.execute_job(job.id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(m.cancel_job(job.id).await.unwrap());
        handle.wait().await;

        let stopped = m.get_job(job.id).await.unwrap();
        assert_eq!(stopped.status, JobStatus::Cancelled);
        assert!(stopped.pages_scraped < stopped.total_pages);

        // Pages scraped before cancellation are retained.
        let (_, total) = m.records(&RecordQuery::for_job(job.id)).await.unwrap();
        assert_eq!(total, u64::from(stopped.pages_scraped));
    }

    #[tokio::test]
    async fn cancel_non_running_job_returns_false_and_leaves_status() {
        let m = manager(MockFetcher::new(PAGE));
        let job = m.create_job(request(&["https://a.example"])).await.unwrap();

        assert!(!m.cancel_job(job.id).await.unwrap());
        assert_eq!(m.get_job(job.id).await.unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn storage_failure_marks_job_failed() {
        let m: TestManager<FailingDataStore> = JobManager::new(
            MockFetcher::new(PAGE),
            InMemoryJobStore::new(),
            FailingDataStore::new("disk full"),
        );
        let job = m
            .create_job(request(&["https://a.example"]).with_rate_limit(1000.0))
            .await
            .unwrap();

        m.execute_job(job.id).await.unwrap().wait().await;

        let failed = m.get_job(job.id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.error_message.as_deref().unwrap_or("").contains("disk full"));
    }

    #[tokio::test]
    async fn update_is_refused_while_running() {
        let m = manager(MockFetcher::new(PAGE));
        let job = m
            .create_job(request(&["https://a.example", "https://b.example"]))
            .await
            .unwrap();
        let handle = m.execute_job(job.id).await.unwrap();

        let err = m
            .update_job(job.id, UpdateJobRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidState(_)));

        m.cancel_job(job.id).await.unwrap();
        handle.wait().await;
    }

    #[tokio::test]
    async fn update_pending_job_changes_page_count() {
        let m = manager(MockFetcher::new(PAGE));
        let job = m.create_job(request(&["https://a.example"])).await.unwrap();

        let updated = m
            .update_job(
                job.id,
                UpdateJobRequest {
                    target_urls: Some(vec![
                        "https://x.example".into(),
                        "https://y.example".into(),
                    ]),
                    ..UpdateJobRequest::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.total_pages, 2);
    }

    #[tokio::test]
    async fn delete_hides_job_but_not_records() {
        let m = manager(MockFetcher::new(PAGE));
        let job = m
            .create_job(request(&["https://a.example"]).with_rate_limit(1000.0))
            .await
            .unwrap();
        m.execute_job(job.id).await.unwrap().wait().await;

        m.delete_job(job.id).await.unwrap();
        assert!(matches!(
            m.get_job(job.id).await.unwrap_err(),
            ScrapeError::NotFound(_)
        ));

        // No cascade: records survive the soft-delete.
        let (_, total) = m.records(&RecordQuery::for_job(job.id)).await.unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn delete_is_refused_while_running() {
        let m = manager(MockFetcher::new(PAGE));
        let job = m
            .create_job(request(&["https://a.example", "https://b.example"]))
            .await
            .unwrap();
        let handle = m.execute_job(job.id).await.unwrap();

        let err = m.delete_job(job.id).await.unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidState(_)));

        m.cancel_job(job.id).await.unwrap();
        handle.wait().await;
    }

    #[tokio::test]
    async fn stats_count_jobs_by_status_and_records() {
        let m = manager(MockFetcher::new(PAGE));
        m.create_job(request(&["https://a.example"])).await.unwrap();
        let done = m
            .create_job(request(&["https://b.example"]).with_rate_limit(1000.0))
            .await
            .unwrap();
        m.execute_job(done.id).await.unwrap().wait().await;

        let stats = m.stats().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.total_jobs, 2);
        assert_eq!(stats.total_records, 1);
    }
}

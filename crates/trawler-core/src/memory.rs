//! Mutex-protected in-memory stores.
//!
//! Used by unit/integration tests and by the CLI's local run mode; the
//! Postgres implementations live in `trawler-db`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use uuid::Uuid;

use crate::error::ScrapeError;
use crate::job::{JobStatus, ScraperJob};
use crate::record::{NewRecord, RecordMetadata, ScrapedRecord};
use crate::traits::{DataStore, JobStore, RecordQuery};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory [`JobStore`] backed by a mutex-protected map.
#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<Mutex<HashMap<Uuid, ScraperJob>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &ScraperJob) -> Result<(), ScrapeError> {
        lock(&self.jobs).insert(job.id, job.clone());
        Ok(())
    }

    async fn update(&self, job: &ScraperJob) -> Result<(), ScrapeError> {
        let mut jobs = lock(&self.jobs);
        if !jobs.contains_key(&job.id) {
            return Err(ScrapeError::Storage(format!("unknown job {}", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn mark_running(&self, job_id: Uuid) -> Result<bool, ScrapeError> {
        let mut jobs = lock(&self.jobs);
        match jobs.get_mut(&job_id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.start();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_progress(
        &self,
        job_id: Uuid,
        pages_scraped: u32,
        progress: f64,
    ) -> Result<(), ScrapeError> {
        let mut jobs = lock(&self.jobs);
        if let Some(job) = jobs.get_mut(&job_id) {
            job.pages_scraped = pages_scraped;
            job.progress = progress;
        }
        Ok(())
    }

    async fn complete_job(&self, job_id: Uuid) -> Result<bool, ScrapeError> {
        let mut jobs = lock(&self.jobs);
        match jobs.get_mut(&job_id) {
            Some(job) if job.status == JobStatus::Running => {
                job.complete();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail_job(&self, job_id: Uuid, error: &str) -> Result<bool, ScrapeError> {
        let mut jobs = lock(&self.jobs);
        match jobs.get_mut(&job_id) {
            Some(job) if job.status == JobStatus::Running => {
                job.fail(error);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel_job(&self, job_id: Uuid) -> Result<bool, ScrapeError> {
        let mut jobs = lock(&self.jobs);
        match jobs.get_mut(&job_id) {
            Some(job) if job.status == JobStatus::Running => {
                job.cancel();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn deactivate(&self, job_id: Uuid) -> Result<bool, ScrapeError> {
        let mut jobs = lock(&self.jobs);
        match jobs.get_mut(&job_id) {
            Some(job) if job.status != JobStatus::Running => {
                job.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<ScraperJob>, ScrapeError> {
        Ok(lock(&self.jobs).get(&job_id).cloned())
    }

    async fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ScraperJob>, ScrapeError> {
        let jobs = lock(&self.jobs);
        let mut matching: Vec<ScraperJob> = jobs
            .values()
            .filter(|j| j.is_active && status.is_none_or(|s| j.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, status: Option<JobStatus>) -> Result<u64, ScrapeError> {
        let jobs = lock(&self.jobs);
        Ok(jobs
            .values()
            .filter(|j| j.is_active && status.is_none_or(|s| j.status == s))
            .count() as u64)
    }
}

/// In-memory append-only [`DataStore`].
#[derive(Clone, Default)]
pub struct InMemoryDataStore {
    records: Arc<Mutex<Vec<ScrapedRecord>>>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(record: &ScrapedRecord, query: &RecordQuery) -> bool {
    query.job_id.is_none_or(|id| record.job_id == id)
        && query.url.as_deref().is_none_or(|url| record.url == url)
}

impl DataStore for InMemoryDataStore {
    async fn append(&self, record: &NewRecord) -> Result<Uuid, ScrapeError> {
        let id = Uuid::new_v4();
        let stored = ScrapedRecord {
            id,
            job_id: record.job_id,
            url: record.url.clone(),
            scraped_at: Utc::now(),
            data: record.data.clone(),
            metadata: RecordMetadata {
                job_id: record.job_id,
                url: record.url.clone(),
                data_size: record.data_size,
                content_hash: record.content_hash.clone(),
            },
        };
        lock(&self.records).push(stored);
        Ok(id)
    }

    async fn get(&self, record_id: Uuid) -> Result<Option<ScrapedRecord>, ScrapeError> {
        Ok(lock(&self.records)
            .iter()
            .find(|r| r.id == record_id)
            .cloned())
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<ScrapedRecord>, ScrapeError> {
        let records = lock(&self.records);
        let limit = if query.limit == 0 {
            usize::MAX
        } else {
            query.limit
        };
        // Appends are chronological, so newest-first is reverse order.
        Ok(records
            .iter()
            .rev()
            .filter(|r| matches(r, query))
            .skip(query.offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, query: &RecordQuery) -> Result<u64, ScrapeError> {
        let records = lock(&self.records);
        Ok(records.iter().filter(|r| matches(r, query)).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::CreateJobRequest;
    use crate::rule::{DataType, ScrapingRule};

    fn test_job() -> ScraperJob {
        ScraperJob::new(CreateJobRequest::new(
            "memory test",
            vec!["https://example.com".into()],
            vec![ScrapingRule::new("title", "h1", DataType::Text)],
        ))
    }

    fn test_record(job_id: Uuid, url: &str) -> NewRecord {
        NewRecord {
            job_id,
            url: url.into(),
            data: serde_json::json!({"title": ["x"]}),
            data_size: 16,
            content_hash: "0".repeat(64),
        }
    }

    #[tokio::test]
    async fn transitions_are_conditional_on_status() {
        let store = InMemoryJobStore::new();
        let job = test_job();
        store.insert(&job).await.unwrap();

        // Not running yet: terminal transitions are refused.
        assert!(!store.complete_job(job.id).await.unwrap());
        assert!(!store.cancel_job(job.id).await.unwrap());

        assert!(store.mark_running(job.id).await.unwrap());
        // Already running: cannot mark again.
        assert!(!store.mark_running(job.id).await.unwrap());

        assert!(store.complete_job(job.id).await.unwrap());
        // Terminal: cancel no longer takes effect.
        assert!(!store.cancel_job(job.id).await.unwrap());
        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn record_progress_does_not_touch_status() {
        let store = InMemoryJobStore::new();
        let job = test_job();
        store.insert(&job).await.unwrap();
        store.mark_running(job.id).await.unwrap();
        store.cancel_job(job.id).await.unwrap();

        // A late progress write from the job task must not resurrect it.
        store.record_progress(job.id, 1, 1.0).await.unwrap();
        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert_eq!(stored.pages_scraped, 1);
    }

    #[tokio::test]
    async fn deactivate_hides_job_from_list_and_count() {
        let store = InMemoryJobStore::new();
        let job = test_job();
        store.insert(&job).await.unwrap();
        assert_eq!(store.count(None).await.unwrap(), 1);

        assert!(store.deactivate(job.id).await.unwrap());
        assert_eq!(store.count(None).await.unwrap(), 0);
        assert!(store.list(None, 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deactivate_refuses_running_jobs() {
        let store = InMemoryJobStore::new();
        let job = test_job();
        store.insert(&job).await.unwrap();
        store.mark_running(job.id).await.unwrap();
        assert!(!store.deactivate(job.id).await.unwrap());
    }

    #[tokio::test]
    async fn query_filters_and_orders_newest_first() {
        let store = InMemoryDataStore::new();
        let job_a = Uuid::new_v4();
        let job_b = Uuid::new_v4();
        store
            .append(&test_record(job_a, "https://a.example/1"))
            .await
            .unwrap();
        store
            .append(&test_record(job_a, "https://a.example/2"))
            .await
            .unwrap();
        store
            .append(&test_record(job_b, "https://b.example/1"))
            .await
            .unwrap();

        let for_a = store.query(&RecordQuery::for_job(job_a)).await.unwrap();
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].url, "https://a.example/2");
        assert_eq!(for_a[1].url, "https://a.example/1");

        let by_url = store
            .query(&RecordQuery {
                url: Some("https://b.example/1".into()),
                ..RecordQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(by_url.len(), 1);
        assert_eq!(by_url[0].job_id, job_b);

        assert_eq!(store.count(&RecordQuery::default()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn query_pagination() {
        let store = InMemoryDataStore::new();
        let job_id = Uuid::new_v4();
        for i in 0..5 {
            store
                .append(&test_record(job_id, &format!("https://a.example/{i}")))
                .await
                .unwrap();
        }

        let page = store
            .query(&RecordQuery {
                job_id: Some(job_id),
                limit: 2,
                offset: 2,
                ..RecordQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].url, "https://a.example/2");
        assert_eq!(page[1].url, "https://a.example/1");
    }
}

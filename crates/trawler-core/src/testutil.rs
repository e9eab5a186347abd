//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests. Interior
//! mutability via `Arc<Mutex<_>>` lets tests assert on recorded calls.

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::error::ScrapeError;
use crate::record::{NewRecord, ScrapedRecord};
use crate::traits::{DataStore, Fetcher, RecordQuery};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher with optional scripted responses.
///
/// Scripted responses are consumed one per call, in order; once exhausted
/// (or when none were scripted) every call returns the fallback body.
/// Fetched URLs are recorded for assertions.
#[derive(Clone)]
pub struct MockFetcher {
    responses: Arc<Mutex<Vec<Result<String, ScrapeError>>>>,
    fallback: String,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    /// A fetcher that returns `html` for every URL.
    pub fn new(html: &str) -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            fallback: html.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A fetcher that fails the first call with `error`.
    pub fn with_error(error: ScrapeError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    /// A fetcher that plays back `responses` in order.
    pub fn with_responses(responses: Vec<Result<String, ScrapeError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            fallback: "<html><body>default</body></html>".to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        self.calls.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.fallback.clone())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// FailingDataStore
// ---------------------------------------------------------------------------

/// Data store whose `append` always fails, for fatal-error-path tests.
#[derive(Clone)]
pub struct FailingDataStore {
    message: String,
}

impl FailingDataStore {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl DataStore for FailingDataStore {
    async fn append(&self, _record: &NewRecord) -> Result<Uuid, ScrapeError> {
        Err(ScrapeError::Storage(self.message.clone()))
    }

    async fn get(&self, _record_id: Uuid) -> Result<Option<ScrapedRecord>, ScrapeError> {
        Ok(None)
    }

    async fn query(&self, _query: &RecordQuery) -> Result<Vec<ScrapedRecord>, ScrapeError> {
        Ok(Vec::new())
    }

    async fn count(&self, _query: &RecordQuery) -> Result<u64, ScrapeError> {
        Ok(0)
    }
}

use thiserror::Error;

/// Application-wide error types for trawler.
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Job definition rejected at creation or update time.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown job or record id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not permitted in the job's current status.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Target returned a non-2xx HTTP status.
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Network/connection error while fetching.
    #[error("network error: {0}")]
    Network(String),

    /// Fetch exceeded the configured timeout.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Page content could not be processed.
    #[error("parse error: {0}")]
    Parse(String),

    /// CSS selector failed to compile.
    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Regex pattern in a transformation failed to compile.
    #[error("invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// JSON serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backing store operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Missing or malformed configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl ScrapeError {
    /// Returns true for failures scoped to a single URL.
    ///
    /// The job loop logs these and moves on to the next target; anything
    /// else aborts the whole job and marks it failed.
    pub fn is_per_url(&self) -> bool {
        matches!(
            self,
            ScrapeError::HttpStatus { .. }
                | ScrapeError::Network(_)
                | ScrapeError::Timeout(_)
                | ScrapeError::Parse(_)
        )
    }
}

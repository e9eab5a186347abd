use std::sync::OnceLock;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Semaphore;
use url::Url;

use trawler_core::error::ScrapeError;
use trawler_core::traits::Fetcher;

/// Cap on concurrent HTTP requests across every job in the process.
///
/// Each job fetches sequentially, so this only bites when many jobs run at
/// once; it keeps N concurrent jobs from collectively exhausting sockets.
const MAX_INFLIGHT_REQUESTS: usize = 100;

static INFLIGHT: OnceLock<Semaphore> = OnceLock::new();

fn inflight() -> &'static Semaphore {
    INFLIGHT.get_or_init(|| Semaphore::new(MAX_INFLIGHT_REQUESTS))
}

/// Configuration for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("trawler/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP fetcher using reqwest.
///
/// Performs one GET per call with a bounded timeout and configurable
/// User-Agent. The underlying connection pool is shared across all clones,
/// and a process-wide semaphore caps total in-flight requests.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, ScrapeError> {
        Self::with_config(FetcherConfig::default())
    }

    pub fn with_config(config: FetcherConfig) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(|e| ScrapeError::Network(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: config.timeout.as_secs(),
        })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        check_scheme(url)?;

        let _permit = inflight()
            .acquire()
            .await
            .map_err(|e| ScrapeError::Network(format!("connection limiter closed: {e}")))?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ScrapeError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                ScrapeError::Network(format!("connection failed: {e}"))
            } else {
                ScrapeError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%url, status = status.as_u16(), "non-success response");
            return Err(ScrapeError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| ScrapeError::Network(format!("failed to read response body: {e}")))
    }
}

/// Only http and https targets are fetchable.
fn check_scheme(url: &str) -> Result<(), ScrapeError> {
    let parsed = Url::parse(url).map_err(|e| ScrapeError::Network(format!("invalid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ScrapeError::Network(format!(
            "URL scheme '{scheme}' is not supported"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_check_allows_http_and_https() {
        assert!(check_scheme("http://example.com").is_ok());
        assert!(check_scheme("https://example.com/page?q=1").is_ok());
    }

    #[test]
    fn scheme_check_rejects_other_schemes() {
        assert!(check_scheme("file:///etc/passwd").is_err());
        assert!(check_scheme("ftp://example.com").is_err());
        assert!(check_scheme("not a url").is_err());
    }

    #[tokio::test]
    async fn fetch_rejects_unsupported_scheme() {
        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher.fetch("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, ScrapeError::Network(_)));
    }

    #[test]
    fn default_config_is_sensible() {
        let config = FetcherConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("trawler/"));
    }
}

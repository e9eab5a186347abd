use chrono::Utc;
use scraper::Html;
use serde_json::{Map, Value, json};

use crate::error::ScrapeError;
use crate::extract;
use crate::record::{METADATA_KEY, compute_hash};
use crate::rule::ScrapingRule;
use crate::traits::Fetcher;

/// Result of scraping a single URL: the merged rule outputs plus the hash
/// of the raw body, for record metadata.
#[derive(Debug, Clone)]
pub struct PageExtraction {
    /// Rule name → extracted values, plus the reserved `_metadata` entry.
    pub data: Value,
    /// SHA-256 of the raw page body.
    pub content_hash: String,
}

/// Orchestrates the fetch → parse → extract pipeline for one URL.
///
/// Generic over the [`Fetcher`] so tests run without real HTTP. Parsing is
/// lenient: malformed HTML still produces a document, and a rule that
/// matches nothing contributes an empty list rather than an error.
#[derive(Clone)]
pub struct ScraperEngine<F: Fetcher> {
    fetcher: F,
}

impl<F: Fetcher> ScraperEngine<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Fetch a page and apply every rule, in order.
    pub async fn scrape(
        &self,
        url: &str,
        rules: &[ScrapingRule],
    ) -> Result<PageExtraction, ScrapeError> {
        let body = self.fetcher.fetch(url).await?;
        tracing::debug!(%url, bytes = body.len(), "fetched page");

        let document = Html::parse_document(&body);

        let mut data = Map::new();
        for rule in rules {
            let extracted = extract::apply_rule(&document, rule, url)?;
            data.insert(rule.name.clone(), extracted);
        }

        data.insert(
            METADATA_KEY.to_string(),
            json!({
                "url": url,
                "scraped_at": Utc::now(),
                "content_length": body.len(),
                "rules_applied": rules.len(),
            }),
        );

        Ok(PageExtraction {
            data: Value::Object(data),
            content_hash: compute_hash(&body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{DataType, ScrapingRule};
    use crate::testutil::MockFetcher;

    #[tokio::test]
    async fn merges_rule_outputs_under_rule_names() {
        let html = r#"<h1>Title</h1><a href="/next">next</a>"#;
        let engine = ScraperEngine::new(MockFetcher::new(html));
        let rules = vec![
            ScrapingRule::new("title", "h1", DataType::Text),
            ScrapingRule::new("links", "a", DataType::Link),
        ];

        let page = engine
            .scrape("https://example.com/page", &rules)
            .await
            .unwrap();

        assert_eq!(page.data["title"], serde_json::json!(["Title"]));
        assert_eq!(
            page.data["links"],
            serde_json::json!(["https://example.com/next"])
        );
    }

    #[tokio::test]
    async fn attaches_page_metadata() {
        let html = "<p>hello</p>";
        let engine = ScraperEngine::new(MockFetcher::new(html));
        let rules = vec![ScrapingRule::new("body", "p", DataType::Text)];

        let page = engine.scrape("https://example.com", &rules).await.unwrap();

        let meta = &page.data[METADATA_KEY];
        assert_eq!(meta["url"], "https://example.com");
        assert_eq!(meta["content_length"], html.len());
        assert_eq!(meta["rules_applied"], 1);
        assert!(meta["scraped_at"].is_string());
        assert_eq!(page.content_hash, compute_hash(html));
    }

    #[tokio::test]
    async fn empty_body_yields_empty_rule_outputs() {
        let engine = ScraperEngine::new(MockFetcher::new(""));
        let rules = vec![ScrapingRule::new("title", "h1", DataType::Text)];

        let page = engine.scrape("https://example.com", &rules).await.unwrap();
        assert_eq!(page.data["title"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn fetch_error_propagates() {
        let engine = ScraperEngine::new(MockFetcher::with_error(ScrapeError::HttpStatus {
            status: 503,
            url: "https://example.com".into(),
        }));
        let err = engine
            .scrape("https://example.com", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::HttpStatus { status: 503, .. }));
    }
}

//! HTTP fetching for trawler jobs.

pub mod fetcher;

pub use fetcher::{FetcherConfig, HttpFetcher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Reserved key under which per-page scrape metadata is stored in a
/// record's `data` map, alongside the rule outputs.
pub const METADATA_KEY: &str = "_metadata";

/// One stored result of applying a job's rules to a single URL.
///
/// Records are append-only and reference their job by id; deleting a job
/// does not remove its records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedRecord {
    pub id: Uuid,
    pub job_id: Uuid,
    pub url: String,
    pub scraped_at: DateTime<Utc>,
    /// Rule name → extracted values, plus the reserved `_metadata` entry.
    pub data: serde_json::Value,
    pub metadata: RecordMetadata,
}

/// Bookkeeping attached to every record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub job_id: Uuid,
    pub url: String,
    /// Size in bytes of the serialized `data` payload.
    pub data_size: usize,
    /// SHA-256 of the raw page body, as 64-char hex.
    pub content_hash: String,
}

/// DTO for appending a new record to a [`DataStore`](crate::traits::DataStore).
///
/// The store assigns the id and timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct NewRecord {
    pub job_id: Uuid,
    pub url: String,
    pub data: serde_json::Value,
    pub data_size: usize,
    pub content_hash: String,
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_hash_is_stable() {
        let h1 = compute_hash("<html>hello</html>");
        let h2 = compute_hash("<html>hello</html>");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn compute_hash_distinguishes_inputs() {
        assert_ne!(compute_hash("a"), compute_hash("b"));
    }
}

//! Evidence record types and content hashing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A stored unit of evidence with source provenance.
///
/// Records are immutable once stored. The embedding for a record lives at the
/// same position in the cache's vector index; only scalar metadata is kept
/// here so the two persisted artifacts stay independently inspectable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceRecord {
    /// Evidence text as retrieved (hashing normalizes; storage does not).
    pub text: String,
    /// Source URL; may be empty for synthesized or cache-internal entries.
    pub url: String,
    /// Platform tag, e.g. "GoogleFactCheck", "Wikipedia".
    pub source: String,
    /// Free-form labels attached at ingest time.
    pub labels: Vec<String>,
    /// Hex SHA-256 of the trimmed, lowercased text; unique per store.
    pub content_hash: String,
    /// When the record entered the cache.
    pub timestamp: DateTime<Utc>,
    /// Cosine similarity against the query; only set on query results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

impl EvidenceRecord {
    pub fn new(
        text: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
        labels: Vec<String>,
    ) -> Self {
        let text = text.into();
        let content_hash = content_hash(&text);
        Self {
            text,
            url: url.into(),
            source: source.into(),
            labels,
            content_hash,
            timestamp: Utc::now(),
            similarity: None,
        }
    }
}

/// Stable dedup hash: hex SHA-256 over the trimmed, lowercased text.
pub fn content_hash(text: &str) -> String {
    let normalized = text.trim().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

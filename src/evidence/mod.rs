//! Evidence aggregation: cache lookups plus live source fan-out.
//!
//! The aggregator owns the retrieval policy. Cache hits lead the pool, live
//! sources are queried concurrently but merged in registration order, every
//! live document is written back into the cache, and the final pool is
//! deduplicated and capped. `retrieve` is infallible: a failing collaborator
//! degrades to fewer evidence items, never to an error.

pub mod sources;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::EvidenceCache;
use crate::error::VerityError;

/// Cache hits prepended to every evidence pool.
pub const CACHE_TOP_K: usize = 3;
/// Upper bound on evidence items handed to the judge.
pub const MAX_EVIDENCE: usize = 5;

const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Normalized unit returned by an evidence source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub text: String,
    pub url: String,
    pub platform: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A queryable evidence platform. Implementations surface transport and
/// non-success responses as plain errors; recovery lives in the aggregator.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self, query: &str, limit: usize) -> anyhow::Result<Vec<SourceDocument>>;
}

/// Merges cached and live evidence for a claim.
pub struct EvidenceAggregator {
    cache: Arc<EvidenceCache>,
    sources: Vec<(Arc<dyn EvidenceSource>, usize)>,
    timeout: Duration,
}

impl EvidenceAggregator {
    pub fn new(cache: Arc<EvidenceCache>) -> Self {
        Self {
            cache,
            sources: Vec::new(),
            timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }

    /// Register a source with its per-query result limit. Sources contribute
    /// to the pool in registration order.
    pub fn with_source(mut self, source: Arc<dyn EvidenceSource>, limit: usize) -> Self {
        self.sources.push((source, limit));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retrieve evidence for a claim, rendered as `"<text> (Source: <url>)"`.
    /// At most [`MAX_EVIDENCE`] items, first occurrence wins on duplicates.
    pub async fn retrieve(&self, claim: &str) -> Vec<String> {
        let mut pool: Vec<SourceDocument> = Vec::new();

        match self.cache.query(claim, CACHE_TOP_K).await {
            Ok(hits) => {
                for hit in hits {
                    pool.push(SourceDocument {
                        text: hit.text,
                        url: hit.url,
                        platform: hit.source,
                        timestamp: Some(hit.timestamp),
                    });
                }
            }
            Err(e) => warn!("Cache lookup failed: {e:#}"),
        }

        // Fan out concurrently; join_all keeps registration order, so the
        // merged pool is deterministic regardless of completion order.
        let fetches = self.sources.iter().map(|(source, limit)| {
            let timeout = self.timeout;
            async move {
                match tokio::time::timeout(timeout, source.fetch(claim, *limit)).await {
                    Ok(Ok(docs)) => docs,
                    Ok(Err(e)) => {
                        warn!("{}", VerityError::source_unavailable(source.name(), format!("{e:#}")));
                        Vec::new()
                    }
                    Err(_) => {
                        warn!("{}", VerityError::source_unavailable(source.name(), "timed out"));
                        Vec::new()
                    }
                }
            }
        });

        for docs in join_all(fetches).await {
            for doc in docs {
                if doc.text.is_empty() {
                    continue;
                }
                if let Err(e) = self
                    .cache
                    .add(&doc.text, &doc.url, &doc.platform, Vec::new())
                    .await
                {
                    warn!("Evidence write-back failed: {e:#}");
                }
                pool.push(doc);
            }
        }

        if let Err(e) = self.cache.persist().await {
            warn!("Cache persist after retrieval failed: {e:#}");
        }

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let merged: Vec<&SourceDocument> = pool
            .iter()
            .filter(|doc| !doc.text.is_empty())
            .filter(|doc| seen.insert((doc.text.clone(), doc.url.clone())))
            .collect();

        let evidence: Vec<String> = merged
            .iter()
            .take(MAX_EVIDENCE)
            .map(|doc| format!("{} (Source: {})", doc.text, doc.url))
            .collect();

        info!("Retrieved {} evidence items for claim", evidence.len());
        evidence
    }
}

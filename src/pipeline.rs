//! End-to-end claim verification: evidence retrieval, judgment with retry,
//! confidence fusion, and the report store.
//!
//! `verify` never returns an error. Every collaborator failure has a
//! documented neutral fallback, because a claim checker that dies mid-answer
//! is worse than one that says `Unverified`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::evidence::EvidenceAggregator;
use crate::judgment::fusion::fuse_confidence;
use crate::judgment::{Judge, Verdict};
use crate::retry::RetryPolicy;

/// A claim under verification, as text or as a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub text: Option<String>,
    pub url: Option<String>,
}

impl Claim {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: Some(text.into()),
            url: None,
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: None,
            url: Some(url.into()),
        }
    }

    /// Text handed to retrieval and judgment. A textual claim takes
    /// precedence over its URL.
    pub fn content(&self) -> &str {
        self.text.as_deref().or(self.url.as_deref()).unwrap_or("")
    }
}

/// Final verification output for one claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictReport {
    pub claim_id: Uuid,
    pub claim: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub reasoning: String,
    pub sources: Vec<String>,
}

/// Drives one claim through retrieval and judgment.
pub struct ClaimVerifier {
    aggregator: EvidenceAggregator,
    judge: Option<Arc<dyn Judge>>,
    retry: RetryPolicy,
}

impl ClaimVerifier {
    pub fn new(aggregator: EvidenceAggregator) -> Self {
        Self {
            aggregator,
            judge: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Verify a claim end to end. No evidence short-circuits to
    /// `Unverified`; a judge that is absent or keeps failing yields the
    /// neutral fallback with the evidence as sources.
    pub async fn verify(&self, claim: &Claim) -> VerdictReport {
        let content = claim.content();
        let evidence = self.aggregator.retrieve(content).await;

        if evidence.is_empty() {
            return VerdictReport {
                claim_id: claim.id,
                claim: content.to_string(),
                verdict: Verdict::Unverified,
                confidence: 0.0,
                reasoning: "No evidence found.".to_string(),
                sources: Vec::new(),
            };
        }

        let raw = match &self.judge {
            Some(judge) => {
                let outcome = self
                    .retry
                    .run("judgment", |_attempt| {
                        let judge = Arc::clone(judge);
                        let content = content.to_string();
                        let evidence = evidence.clone();
                        async move { judge.evaluate(&content, &evidence).await }
                    })
                    .await;
                match outcome {
                    Ok(raw) => Some(raw),
                    Err(e) => {
                        warn!("Judgment failed after retries: {e:#}");
                        None
                    }
                }
            }
            None => None,
        };

        let report = match raw {
            Some(raw) => {
                let confidence = fuse_confidence(&raw);
                let verdict = raw
                    .verdict
                    .as_deref()
                    .map(Verdict::from_label)
                    .unwrap_or(Verdict::Unverified);
                let reasoning = raw
                    .reasoning
                    .unwrap_or_else(|| "No explanation available.".to_string());
                let sources = match raw.relevant_sources {
                    Some(sources) if !sources.is_empty() => sources,
                    _ => evidence,
                };
                VerdictReport {
                    claim_id: claim.id,
                    claim: content.to_string(),
                    verdict,
                    confidence,
                    reasoning,
                    sources,
                }
            }
            None => VerdictReport {
                claim_id: claim.id,
                claim: content.to_string(),
                verdict: Verdict::Unverified,
                confidence: 0.0,
                reasoning: "Judgment service failed to return a valid verdict.".to_string(),
                sources: evidence,
            },
        };

        info!(
            "Verdict for claim {}: {:?} ({:.1}%)",
            report.claim_id, report.verdict, report.confidence
        );
        report
    }
}

/// Keyed storage for finished reports.
#[async_trait]
pub trait VerdictStore: Send + Sync {
    async fn put(&self, report: VerdictReport) -> Result<()>;
    async fn get(&self, claim_id: Uuid) -> Result<Option<VerdictReport>>;
}

/// Process-local report store.
#[derive(Default)]
pub struct InMemoryVerdictStore {
    reports: RwLock<HashMap<Uuid, VerdictReport>>,
}

impl InMemoryVerdictStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VerdictStore for InMemoryVerdictStore {
    async fn put(&self, report: VerdictReport) -> Result<()> {
        self.reports.write().await.insert(report.claim_id, report);
        Ok(())
    }

    async fn get(&self, claim_id: Uuid) -> Result<Option<VerdictReport>> {
        Ok(self.reports.read().await.get(&claim_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use anyhow::bail;
    use sha2::{Digest, Sha256};
    use serde_json::json;
    use tempfile::tempdir;

    use crate::cache::EvidenceCache;
    use crate::embedding::{normalize, Embedder};
    use crate::evidence::{EvidenceSource, SourceDocument};
    use crate::judgment::RawJudgment;

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let digest = Sha256::digest(t.trim().to_lowercase().as_bytes());
                    let mut v: Vec<f32> = digest[..8].iter().map(|b| *b as f32 + 1.0).collect();
                    normalize(&mut v);
                    v
                })
                .collect())
        }
    }

    struct StubSource;

    #[async_trait]
    impl EvidenceSource for StubSource {
        fn name(&self) -> &str {
            "stub"
        }

        async fn fetch(&self, _query: &str, _limit: usize) -> Result<Vec<SourceDocument>> {
            Ok(vec![SourceDocument {
                text: "supporting article".into(),
                url: "https://evidence".into(),
                platform: "stub".into(),
                timestamp: None,
            }])
        }
    }

    /// Judge that counts invocations and fails until `failures` runs out.
    struct CountingJudge {
        calls: AtomicU32,
        failures: u32,
        judgment: RawJudgment,
    }

    impl CountingJudge {
        fn succeeding(judgment: RawJudgment) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures: 0,
                judgment,
            }
        }

        fn flaky(failures: u32, judgment: RawJudgment) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                judgment,
            }
        }
    }

    #[async_trait]
    impl Judge for CountingJudge {
        async fn evaluate(&self, _claim: &str, _evidence: &[String]) -> Result<RawJudgment> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                bail!("endpoint hiccup");
            }
            Ok(self.judgment.clone())
        }
    }

    fn aggregator_with_evidence(dir: &std::path::Path) -> EvidenceAggregator {
        let cache = Arc::new(EvidenceCache::open(dir, Arc::new(StubEmbedder), false).unwrap());
        EvidenceAggregator::new(cache).with_source(Arc::new(StubSource), 3)
    }

    fn aggregator_without_evidence(dir: &std::path::Path) -> EvidenceAggregator {
        let cache = Arc::new(EvidenceCache::open(dir, Arc::new(StubEmbedder), false).unwrap());
        EvidenceAggregator::new(cache)
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[test]
    fn claim_content_prefers_text_over_url() {
        let textual = Claim::from_text("the sky is green");
        assert_eq!(textual.content(), "the sky is green");

        let linked = Claim::from_url("https://example.org/story");
        assert_eq!(linked.content(), "https://example.org/story");

        let both = Claim {
            id: Uuid::new_v4(),
            text: Some("stated claim".into()),
            url: Some("https://example.org".into()),
        };
        assert_eq!(both.content(), "stated claim");
    }

    #[tokio::test]
    async fn no_evidence_short_circuits_without_calling_the_judge() {
        let dir = tempdir().unwrap();
        let judge = Arc::new(CountingJudge::succeeding(RawJudgment::default()));
        let verifier = ClaimVerifier::new(aggregator_without_evidence(dir.path()))
            .with_judge(judge.clone());

        let report = verifier.verify(&Claim::from_text("unheard of")).await;

        assert_eq!(report.verdict, Verdict::Unverified);
        assert_eq!(report.confidence, 0.0);
        assert_eq!(report.reasoning, "No evidence found.");
        assert!(report.sources.is_empty());
        assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn judged_verdict_flows_into_the_report() {
        let dir = tempdir().unwrap();
        let judgment = RawJudgment {
            verdict: Some("True".into()),
            confidence: Some(json!(4)),
            reasoning: Some("confirmed by two outlets".into()),
            ..RawJudgment::default()
        };
        let verifier = ClaimVerifier::new(aggregator_with_evidence(dir.path()))
            .with_judge(Arc::new(CountingJudge::succeeding(judgment)));

        let report = verifier.verify(&Claim::from_text("checked claim")).await;

        assert_eq!(report.verdict, Verdict::True);
        assert_eq!(report.confidence, 80.0);
        assert_eq!(report.reasoning, "confirmed by two outlets");
        // Judgment listed no sources, so the evidence stands in.
        assert_eq!(report.sources, vec!["supporting article (Source: https://evidence)"]);
    }

    #[tokio::test]
    async fn explicit_judgment_sources_are_kept() {
        let dir = tempdir().unwrap();
        let judgment = RawJudgment {
            verdict: Some("False".into()),
            confidence: Some(json!(90)),
            relevant_sources: Some(vec!["https://primary".into()]),
            ..RawJudgment::default()
        };
        let verifier = ClaimVerifier::new(aggregator_with_evidence(dir.path()))
            .with_judge(Arc::new(CountingJudge::succeeding(judgment)));

        let report = verifier.verify(&Claim::from_text("debunked claim")).await;
        assert_eq!(report.sources, vec!["https://primary"]);
        assert_eq!(report.reasoning, "No explanation available.");
    }

    #[tokio::test]
    async fn missing_judge_yields_the_neutral_fallback() {
        let dir = tempdir().unwrap();
        let verifier = ClaimVerifier::new(aggregator_with_evidence(dir.path()));

        let report = verifier.verify(&Claim::from_text("some claim")).await;

        assert_eq!(report.verdict, Verdict::Unverified);
        assert_eq!(report.confidence, 0.0);
        assert_eq!(report.sources, vec!["supporting article (Source: https://evidence)"]);
    }

    #[tokio::test]
    async fn exhausted_retries_yield_the_neutral_fallback() {
        let dir = tempdir().unwrap();
        let judge = Arc::new(CountingJudge::flaky(99, RawJudgment::default()));
        let verifier = ClaimVerifier::new(aggregator_with_evidence(dir.path()))
            .with_judge(judge.clone())
            .with_retry(fast_retry());

        let report = verifier.verify(&Claim::from_text("some claim")).await;

        assert_eq!(report.verdict, Verdict::Unverified);
        assert_eq!(report.confidence, 0.0);
        assert_eq!(judge.calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.sources, vec!["supporting article (Source: https://evidence)"]);
    }

    #[tokio::test]
    async fn flaky_judge_recovers_within_the_retry_budget() {
        let dir = tempdir().unwrap();
        let judgment = RawJudgment {
            verdict: Some("misleading".into()),
            confidence: Some(json!(60)),
            ..RawJudgment::default()
        };
        let judge = Arc::new(CountingJudge::flaky(1, judgment));
        let verifier = ClaimVerifier::new(aggregator_with_evidence(dir.path()))
            .with_judge(judge.clone())
            .with_retry(fast_retry());

        let report = verifier.verify(&Claim::from_text("wobbly claim")).await;

        assert_eq!(report.verdict, Verdict::Misleading);
        assert_eq!(report.confidence, 60.0);
        assert_eq!(judge.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn report_store_round_trips_by_claim_id() {
        let store = InMemoryVerdictStore::new();
        let report = VerdictReport {
            claim_id: Uuid::new_v4(),
            claim: "stored claim".into(),
            verdict: Verdict::True,
            confidence: 88.0,
            reasoning: "well sourced".into(),
            sources: vec!["https://a".into()],
        };

        store.put(report.clone()).await.unwrap();
        let fetched = store.get(report.claim_id).await.unwrap().unwrap();
        assert_eq!(fetched.claim, "stored claim");
        assert_eq!(fetched.verdict, Verdict::True);

        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }
}

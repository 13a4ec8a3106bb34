//! Command-line claim verifier.
//!
//! Wires the evidence cache, the configured live sources and the judgment
//! endpoint into one pipeline run: `verity <claim text or URL>` prints the
//! JSON verdict report.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use verity::cache::EvidenceCache;
use verity::config::VerityConfig;
use verity::embedding::FastEmbedder;
use verity::evidence::sources::{FactCheckSource, NewsApiSource, RedditSource, WikipediaSource};
use verity::evidence::EvidenceAggregator;
use verity::judgment::HttpJudge;
use verity::logging;
use verity::pipeline::{Claim, ClaimVerifier, InMemoryVerdictStore, VerdictStore};
use verity::retry::RetryPolicy;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let config = VerityConfig::from_env();
    logging::init(&config.log_level);

    let input = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if input.trim().is_empty() {
        eprintln!("usage: verity <claim text or URL>");
        std::process::exit(2);
    }

    let embedder = Arc::new(FastEmbedder::new());
    let cache = Arc::new(EvidenceCache::open(
        &config.data_dir,
        embedder,
        config.cache_auto_persist,
    )?);

    let mut aggregator = EvidenceAggregator::new(cache)
        .with_timeout(Duration::from_secs(config.source_timeout_secs));
    if let Some(key) = &config.factcheck_api_key {
        aggregator = aggregator.with_source(Arc::new(FactCheckSource::new(key)), 3);
    }
    if let Some(key) = &config.newsapi_key {
        aggregator = aggregator.with_source(Arc::new(NewsApiSource::new(key)), 3);
    }
    aggregator = aggregator
        .with_source(Arc::new(WikipediaSource::new()), 2)
        .with_source(Arc::new(RedditSource::new()), 2);

    let mut verifier = ClaimVerifier::new(aggregator).with_retry(RetryPolicy::new(
        config.judge_max_attempts,
        Duration::from_secs(2),
    ));
    match &config.judge_url {
        Some(url) => {
            verifier = verifier.with_judge(Arc::new(HttpJudge::new(
                url,
                config.judge_api_key.clone(),
            )?));
        }
        None => warn!("VERITY_JUDGE_URL not set; claims will come back Unverified"),
    }

    let claim = if input.starts_with("http://") || input.starts_with("https://") {
        Claim::from_url(input)
    } else {
        Claim::from_text(input)
    };
    info!("Verifying claim {}", claim.id);

    let report = verifier.verify(&claim).await;

    let store = InMemoryVerdictStore::new();
    store.put(report.clone()).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

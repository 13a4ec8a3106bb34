//! HTTP adapters for the live evidence platforms.
//!
//! Each adapter normalizes one provider's response shape into
//! [`SourceDocument`]s and reports transport failures and non-success
//! statuses as errors for the aggregator to absorb. Response parsing is kept
//! in free functions so it can be exercised against canned payloads.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{EvidenceSource, SourceDocument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("verity/", env!("CARGO_PKG_VERSION"), " (claim verification)");

const FACTCHECK_URL: &str = "https://factchecktools.googleapis.com/v1alpha1/claims:search";
const NEWS_URL: &str = "https://newsapi.org/v2/everything";
const WIKI_URL: &str = "https://en.wikipedia.org/w/api.php";
const REDDIT_URL: &str = "https://www.reddit.com/search.json";

fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// Google FactCheck Tools
// ---------------------------------------------------------------------------

/// Google FactCheck Tools `claims:search`. The document text is the claim
/// itself; url and review date come from the first attached review.
pub struct FactCheckSource {
    client: Client,
    api_key: String,
}

impl FactCheckSource {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FactCheckResponse {
    #[serde(default)]
    claims: Vec<FactCheckClaim>,
}

#[derive(Debug, Default, Deserialize)]
struct FactCheckClaim {
    #[serde(default)]
    text: String,
    #[serde(default, rename = "claimReview")]
    claim_review: Vec<ClaimReview>,
}

#[derive(Debug, Default, Deserialize)]
struct ClaimReview {
    #[serde(default)]
    url: String,
    #[serde(default, rename = "reviewDate")]
    review_date: String,
}

fn normalize_factcheck(body: FactCheckResponse) -> Vec<SourceDocument> {
    body.claims
        .into_iter()
        .map(|claim| {
            let review = claim.claim_review.into_iter().next().unwrap_or_default();
            SourceDocument {
                text: claim.text,
                url: review.url,
                platform: "GoogleFactCheck".to_string(),
                timestamp: parse_rfc3339(&review.review_date),
            }
        })
        .collect()
}

#[async_trait]
impl EvidenceSource for FactCheckSource {
    fn name(&self) -> &str {
        "GoogleFactCheck"
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<SourceDocument>> {
        let resp = self
            .client
            .get(FACTCHECK_URL)
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("query", query.to_string()),
                ("key", self.api_key.clone()),
                ("pageSize", limit.to_string()),
                ("languageCode", "en".to_string()),
            ])
            .send()
            .await
            .context("request failed")?;
        if !resp.status().is_success() {
            bail!("HTTP {}", resp.status());
        }
        let body: FactCheckResponse = resp.json().await.context("unexpected response shape")?;
        Ok(normalize_factcheck(body))
    }
}

// ---------------------------------------------------------------------------
// NewsAPI
// ---------------------------------------------------------------------------

/// NewsAPI `/v2/everything`, relevancy-sorted. Document text joins the
/// headline and description.
pub struct NewsApiSource {
    client: Client,
    api_key: String,
}

impl NewsApiSource {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<NewsArticle>,
}

#[derive(Debug, Default, Deserialize)]
struct NewsArticle {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default, rename = "publishedAt")]
    published_at: String,
}

fn normalize_news(body: NewsResponse) -> Vec<SourceDocument> {
    body.articles
        .into_iter()
        .map(|article| SourceDocument {
            text: format!(
                "{} - {}",
                article.title,
                article.description.unwrap_or_default()
            ),
            url: article.url,
            platform: "NewsAPI".to_string(),
            timestamp: parse_rfc3339(&article.published_at),
        })
        .collect()
}

#[async_trait]
impl EvidenceSource for NewsApiSource {
    fn name(&self) -> &str {
        "NewsAPI"
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<SourceDocument>> {
        let resp = self
            .client
            .get(NEWS_URL)
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("q", query.to_string()),
                ("language", "en".to_string()),
                ("sortBy", "relevancy".to_string()),
                ("pageSize", limit.to_string()),
                ("apiKey", self.api_key.clone()),
            ])
            .send()
            .await
            .context("request failed")?;
        if !resp.status().is_success() {
            bail!("HTTP {}", resp.status());
        }
        let body: NewsResponse = resp.json().await.context("unexpected response shape")?;
        Ok(normalize_news(body))
    }
}

// ---------------------------------------------------------------------------
// Wikipedia
// ---------------------------------------------------------------------------

/// MediaWiki full-text search. Keyless; snippets arrive with `searchmatch`
/// highlight spans and HTML entities, both stripped here. The article URL is
/// derived from the page title.
pub struct WikipediaSource {
    client: Client,
}

impl WikipediaSource {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for WikipediaSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, Deserialize)]
struct WikiResponse {
    #[serde(default)]
    query: WikiQuery,
}

#[derive(Debug, Default, Deserialize)]
struct WikiQuery {
    #[serde(default)]
    search: Vec<WikiHit>,
}

#[derive(Debug, Default, Deserialize)]
struct WikiHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

fn normalize_wikipedia(body: WikiResponse) -> Vec<SourceDocument> {
    body.query
        .search
        .into_iter()
        .map(|hit| {
            let stripped = hit
                .snippet
                .replace(r#"<span class="searchmatch">"#, "")
                .replace("</span>", "");
            SourceDocument {
                text: html_escape::decode_html_entities(&stripped).into_owned(),
                url: format!("https://en.wikipedia.org/wiki/{}", hit.title.replace(' ', "_")),
                platform: "Wikipedia".to_string(),
                timestamp: None,
            }
        })
        .collect()
}

#[async_trait]
impl EvidenceSource for WikipediaSource {
    fn name(&self) -> &str {
        "Wikipedia"
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<SourceDocument>> {
        let resp = self
            .client
            .get(WIKI_URL)
            .timeout(REQUEST_TIMEOUT)
            // Wikipedia rejects requests without an identifying User-Agent.
            .header("User-Agent", USER_AGENT)
            .query(&[
                ("action", "query".to_string()),
                ("list", "search".to_string()),
                ("srsearch", query.to_string()),
                ("utf8", "1".to_string()),
                ("format", "json".to_string()),
                ("srlimit", limit.to_string()),
            ])
            .send()
            .await
            .context("request failed")?;
        if !resp.status().is_success() {
            bail!("HTTP {}", resp.status());
        }
        let body: WikiResponse = resp.json().await.context("unexpected response shape")?;
        Ok(normalize_wikipedia(body))
    }
}

// ---------------------------------------------------------------------------
// Reddit
// ---------------------------------------------------------------------------

/// Reddit public search. Keyless; the document text joins the submission
/// title and selftext, the url points at the subreddit.
pub struct RedditSource {
    client: Client,
}

impl RedditSource {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for RedditSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RedditResponse {
    #[serde(default)]
    data: RedditListing,
}

#[derive(Debug, Default, Deserialize)]
struct RedditListing {
    #[serde(default)]
    children: Vec<RedditChild>,
}

#[derive(Debug, Default, Deserialize)]
struct RedditChild {
    #[serde(default)]
    data: RedditPost,
}

#[derive(Debug, Default, Deserialize)]
struct RedditPost {
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    created_utc: Option<f64>,
}

fn normalize_reddit(body: RedditResponse) -> Vec<SourceDocument> {
    body.data
        .children
        .into_iter()
        .map(|child| {
            let post = child.data;
            SourceDocument {
                text: format!("{} {}", post.title, post.selftext).trim().to_string(),
                url: format!("https://reddit.com/r/{}", post.subreddit),
                platform: "Reddit".to_string(),
                timestamp: post
                    .created_utc
                    .and_then(|epoch| DateTime::from_timestamp(epoch as i64, 0)),
            }
        })
        .collect()
}

#[async_trait]
impl EvidenceSource for RedditSource {
    fn name(&self) -> &str {
        "Reddit"
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<SourceDocument>> {
        let resp = self
            .client
            .get(REDDIT_URL)
            .timeout(REQUEST_TIMEOUT)
            .header("User-Agent", USER_AGENT)
            .query(&[("q", query.to_string()), ("limit", limit.to_string())])
            .send()
            .await
            .context("request failed")?;
        if !resp.status().is_success() {
            bail!("HTTP {}", resp.status());
        }
        let body: RedditResponse = resp.json().await.context("unexpected response shape")?;
        Ok(normalize_reddit(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn factcheck_uses_the_first_review() {
        let body: FactCheckResponse = serde_json::from_value(json!({
            "claims": [{
                "text": "The moon is made of cheese",
                "claimReview": [
                    {"url": "https://checker.org/a", "reviewDate": "2023-04-01T00:00:00Z"},
                    {"url": "https://checker.org/b", "reviewDate": "2023-05-01T00:00:00Z"}
                ]
            }]
        }))
        .unwrap();

        let docs = normalize_factcheck(body);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "The moon is made of cheese");
        assert_eq!(docs[0].url, "https://checker.org/a");
        assert_eq!(docs[0].platform, "GoogleFactCheck");
        assert!(docs[0].timestamp.is_some());
    }

    #[test]
    fn factcheck_tolerates_missing_reviews() {
        let body: FactCheckResponse = serde_json::from_value(json!({
            "claims": [{"text": "Unreviewed claim"}]
        }))
        .unwrap();

        let docs = normalize_factcheck(body);
        assert_eq!(docs[0].url, "");
        assert!(docs[0].timestamp.is_none());
    }

    #[test]
    fn news_joins_title_and_description() {
        let body: NewsResponse = serde_json::from_value(json!({
            "articles": [{
                "title": "Breaking",
                "description": "Details inside",
                "url": "https://news.example/1",
                "publishedAt": "2024-02-02T12:00:00Z"
            }]
        }))
        .unwrap();

        let docs = normalize_news(body);
        assert_eq!(docs[0].text, "Breaking - Details inside");
        assert_eq!(docs[0].platform, "NewsAPI");
        assert!(docs[0].timestamp.is_some());
    }

    #[test]
    fn news_treats_a_null_description_as_empty() {
        let body: NewsResponse = serde_json::from_value(json!({
            "articles": [{"title": "Headline only", "description": null, "url": "https://n"}]
        }))
        .unwrap();

        assert_eq!(normalize_news(body)[0].text, "Headline only - ");
    }

    #[test]
    fn wikipedia_strips_highlights_and_decodes_entities() {
        let body: WikiResponse = serde_json::from_value(json!({
            "query": {"search": [{
                "title": "Apollo 11",
                "snippet": "the <span class=\"searchmatch\">Moon</span> landing &quot;hoax&quot;"
            }]}
        }))
        .unwrap();

        let docs = normalize_wikipedia(body);
        assert_eq!(docs[0].text, "the Moon landing \"hoax\"");
        assert_eq!(docs[0].url, "https://en.wikipedia.org/wiki/Apollo_11");
    }

    #[test]
    fn reddit_builds_text_and_subreddit_url() {
        let body: RedditResponse = serde_json::from_value(json!({
            "data": {"children": [{
                "data": {
                    "title": "Is this true?",
                    "selftext": "Saw it on the news.",
                    "subreddit": "skeptic",
                    "created_utc": 1700000000.0
                }
            }]}
        }))
        .unwrap();

        let docs = normalize_reddit(body);
        assert_eq!(docs[0].text, "Is this true? Saw it on the news.");
        assert_eq!(docs[0].url, "https://reddit.com/r/skeptic");
        assert!(docs[0].timestamp.is_some());
    }

    #[test]
    fn reddit_title_only_posts_lose_the_trailing_space() {
        let body: RedditResponse = serde_json::from_value(json!({
            "data": {"children": [{"data": {"title": "Just a title", "subreddit": "news"}}]}
        }))
        .unwrap();

        assert_eq!(normalize_reddit(body)[0].text, "Just a title");
    }
}

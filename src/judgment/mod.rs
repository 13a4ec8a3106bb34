//! Judgment: evaluating a claim against evidence through an inference
//! endpoint, plus the confidence fusion heuristic.
//!
//! The endpoint is reached through the [`Judge`] trait so the pipeline and
//! tests can swap in stubs. [`HttpJudge`] talks to a JSON-over-HTTP service
//! that may wrap its output in markdown fences; the response is cleaned and
//! parsed into a [`RawJudgment`] with every field optional, because real
//! model output drops or mangles fields routinely.

pub mod fusion;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::VerityError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Verdict labels the judgment endpoint is expected to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    True,
    False,
    Misleading,
    Unverified,
}

impl Verdict {
    /// Case-insensitive parse; anything unrecognized is `Unverified`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "true" => Self::True,
            "false" => Self::False,
            "misleading" => Self::Misleading,
            _ => Self::Unverified,
        }
    }
}

/// Verbatim judgment output before normalization. Confidence stays a raw
/// JSON value: endpoints have returned numbers, percent strings and 0-5
/// scales, and [`fusion`] owns the coercion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawJudgment {
    #[serde(default)]
    pub verdict: Option<String>,
    #[serde(default)]
    pub confidence: Option<Value>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub relevant_sources: Option<Vec<String>>,
    #[serde(default)]
    pub authenticity_score: Option<f64>,
}

/// Evaluates a claim against rendered evidence items.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn evaluate(&self, claim: &str, evidence: &[String]) -> Result<RawJudgment>;
}

/// HTTP adapter for the judgment inference endpoint. POSTs
/// `{"claim", "evidence"}` and parses the body after fence cleanup; a body
/// that does not parse as a judgment is a [`VerityError::MalformedJudgment`].
pub struct HttpJudge {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    fence_open: Regex,
    fence_close: Regex,
}

impl HttpJudge {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key,
            fence_open: Regex::new(r"(?im)^```(json)?")?,
            fence_close: Regex::new(r"```$")?,
        })
    }

    /// Strip markdown fences like ```json ... ``` from model output. Empty
    /// output becomes `{}` so parsing yields an all-default judgment.
    fn clean_json_output(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return "{}".to_string();
        }
        let stripped = self.fence_open.replace_all(text.trim(), "");
        let stripped = self.fence_close.replace(stripped.trim(), "");
        stripped.trim().to_string()
    }
}

#[async_trait]
impl Judge for HttpJudge {
    async fn evaluate(&self, claim: &str, evidence: &[String]) -> Result<RawJudgment> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(REQUEST_TIMEOUT)
            .json(&serde_json::json!({ "claim": claim, "evidence": evidence }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await.context("judgment request failed")?;
        if !resp.status().is_success() {
            bail!("judgment endpoint returned HTTP {}", resp.status());
        }

        let raw = resp.text().await.context("judgment response unreadable")?;
        let cleaned = self.clean_json_output(&raw);
        let judgment: RawJudgment = serde_json::from_str(&cleaned)
            .map_err(|e| VerityError::MalformedJudgment(e.to_string()))?;
        debug!("Judgment parsed successfully");
        Ok(judgment)
    }
}

//! Anchoring sealed ledger hashes in an external registry.
//!
//! The engine only needs an opaque transaction reference back, so the
//! registry sits behind a one-method trait. Anchoring is best-effort by
//! contract: the caller substitutes an error marker on failure and the
//! ledger entry is kept either way.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Marker used in place of a transaction reference when no registry is
/// configured.
pub const UNANCHORED: &str = "unanchored";

#[async_trait]
pub trait AnchorClient: Send + Sync {
    /// Anchor a ledger hash, returning the registry's transaction reference.
    async fn anchor(&self, ledger_hash: &str) -> Result<String>;
}

/// Registry adapter: POSTs `{"hash"}` and reads `{"tx_ref"}`.
pub struct HttpAnchor {
    client: Client,
    endpoint: String,
}

impl HttpAnchor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnchorReceipt {
    tx_ref: String,
}

#[async_trait]
impl AnchorClient for HttpAnchor {
    async fn anchor(&self, ledger_hash: &str) -> Result<String> {
        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(REQUEST_TIMEOUT)
            .json(&serde_json::json!({ "hash": ledger_hash }))
            .send()
            .await
            .context("anchoring request failed")?;
        if !resp.status().is_success() {
            bail!("anchoring registry returned HTTP {}", resp.status());
        }
        let receipt: AnchorReceipt = resp.json().await.context("unexpected receipt shape")?;
        Ok(receipt.tx_ref)
    }
}

/// Anchor client for deployments without a registry endpoint.
pub struct NoopAnchor;

#[async_trait]
impl AnchorClient for NoopAnchor {
    async fn anchor(&self, _ledger_hash: &str) -> Result<String> {
        Ok(UNANCHORED.to_string())
    }
}

//! Append-only ledger of sealed consensus snapshots.
//!
//! The store is a trait so the engine never touches a concrete backend;
//! deployments can move to a database without touching consensus logic.
//! There is deliberately no mutation or removal API.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::snapshot::ConsensusSnapshot;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append(&self, snapshot: ConsensusSnapshot) -> Result<()>;
    /// Every entry in insertion order.
    async fn all(&self) -> Result<Vec<ConsensusSnapshot>>;
    async fn for_claim(&self, claim_id: &str) -> Result<Vec<ConsensusSnapshot>>;
}

/// Process-local ledger. A claim that crosses several thresholds holds
/// several entries, one per sealing.
#[derive(Default)]
pub struct InMemoryLedger {
    entries: RwLock<Vec<ConsensusSnapshot>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn append(&self, snapshot: ConsensusSnapshot) -> Result<()> {
        self.entries.write().await.push(snapshot);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<ConsensusSnapshot>> {
        Ok(self.entries.read().await.clone())
    }

    async fn for_claim(&self, claim_id: &str) -> Result<Vec<ConsensusSnapshot>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|entry| entry.claim_id == claim_id)
            .cloned()
            .collect())
    }
}

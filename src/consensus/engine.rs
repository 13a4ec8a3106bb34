//! Per-claim consensus engine: vote intake, threshold sealing, anchoring
//! and event fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::realtime::{RoomEvent, SubscriberRegistry};

use super::anchor::AnchorClient;
use super::ledger::LedgerStore;
use super::snapshot::{calculate_consensus, ConsensusSnapshot};
use super::vote::Vote;

use super::DEFAULT_VOTE_THRESHOLDS;

/// Coordinates community review per claim. Each claim has its own vote room
/// behind a mutex held across append, broadcast and finalization, so votes
/// for one claim serialize while distinct claims proceed in parallel.
pub struct ConsensusEngine {
    rooms: RwLock<HashMap<String, Arc<Mutex<Vec<Vote>>>>>,
    thresholds: Vec<usize>,
    ledger: Arc<dyn LedgerStore>,
    anchor: Arc<dyn AnchorClient>,
    registry: Arc<SubscriberRegistry>,
}

impl ConsensusEngine {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        anchor: Arc<dyn AnchorClient>,
        registry: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            thresholds: DEFAULT_VOTE_THRESHOLDS.to_vec(),
            ledger,
            anchor,
            registry,
        }
    }

    pub fn with_thresholds(mut self, thresholds: Vec<usize>) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Record one vote. Emits a `new_vote` event, then seals a snapshot when
    /// the vote count lands exactly on a configured threshold; the sealed
    /// snapshot is returned after it is anchored, ledgered and broadcast.
    pub async fn submit_vote(
        &self,
        claim_id: &str,
        vote: Vote,
    ) -> Result<Option<ConsensusSnapshot>> {
        let room = self.room(claim_id).await;
        let mut votes = room.lock().await;

        votes.push(vote.clone());
        self.registry
            .broadcast(claim_id, &RoomEvent::NewVote { vote })
            .await;

        self.finalize_on_threshold(claim_id, &votes).await
    }

    /// Record a batch of votes in one room acquisition, emitting a
    /// `new_vote` event per vote. The threshold check runs once against the
    /// final count: a batch that crosses a threshold mid-way without landing
    /// on one seals nothing.
    pub async fn ingest_votes(
        &self,
        claim_id: &str,
        batch: Vec<Vote>,
    ) -> Result<Option<ConsensusSnapshot>> {
        if batch.is_empty() {
            return Ok(None);
        }

        let room = self.room(claim_id).await;
        let mut votes = room.lock().await;

        for vote in batch {
            votes.push(vote.clone());
            self.registry
                .broadcast(claim_id, &RoomEvent::NewVote { vote })
                .await;
        }

        self.finalize_on_threshold(claim_id, &votes).await
    }

    /// All votes recorded for a claim, in arrival order.
    pub async fn votes(&self, claim_id: &str) -> Vec<Vote> {
        let room = { self.rooms.read().await.get(claim_id).cloned() };
        match room {
            Some(room) => room.lock().await.clone(),
            None => Vec::new(),
        }
    }

    /// The full append-only ledger.
    pub async fn history(&self) -> Result<Vec<ConsensusSnapshot>> {
        self.ledger.all().await
    }

    async fn room(&self, claim_id: &str) -> Arc<Mutex<Vec<Vote>>> {
        {
            let rooms = self.rooms.read().await;
            if let Some(room) = rooms.get(claim_id) {
                return room.clone();
            }
        }
        let mut rooms = self.rooms.write().await;
        rooms.entry(claim_id.to_string()).or_default().clone()
    }

    async fn finalize_on_threshold(
        &self,
        claim_id: &str,
        votes: &[Vote],
    ) -> Result<Option<ConsensusSnapshot>> {
        let count = votes.len();
        if !self.thresholds.contains(&count) {
            return Ok(None);
        }

        let (verdict, confidence) = calculate_consensus(votes);
        let mut snapshot = ConsensusSnapshot {
            claim_id: claim_id.to_string(),
            verdict,
            confidence,
            votes: votes.to_vec(),
            threshold: count,
            timestamp: Utc::now(),
            ledger_hash: String::new(),
            anchor_ref: String::new(),
        };
        snapshot.ledger_hash = snapshot.canonical_hash()?;
        snapshot.anchor_ref = match self.anchor.anchor(&snapshot.ledger_hash).await {
            Ok(tx_ref) => tx_ref,
            Err(e) => {
                warn!("Anchoring failed for claim {claim_id}: {e:#}");
                format!("anchoring failed: {e:#}")
            }
        };

        self.ledger.append(snapshot.clone()).await?;
        self.registry
            .broadcast(
                claim_id,
                &RoomEvent::Finalized {
                    data: snapshot.clone(),
                },
            )
            .await;
        info!(
            "Consensus sealed for claim {} at threshold {}: {:?} ({:.1}%)",
            claim_id, count, snapshot.verdict, snapshot.confidence
        );

        Ok(Some(snapshot))
    }
}

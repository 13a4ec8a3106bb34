//! Weighted consensus calculation and sealed snapshots.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::vote::{Stance, Vote};

/// Outcome of a community consensus round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusVerdict {
    Support,
    Refute,
    Misleading,
    Unverified,
}

impl From<Stance> for ConsensusVerdict {
    fn from(stance: Stance) -> Self {
        match stance {
            Stance::Support => ConsensusVerdict::Support,
            Stance::Refute => ConsensusVerdict::Refute,
            Stance::Misleading => ConsensusVerdict::Misleading,
        }
    }
}

/// Weighted consensus over a vote list. Confidence is the winning share of
/// the total weight as a percentage. No votes means `Unverified` at 0.
///
/// Tallies accumulate in first-seen stance order and the winner must be
/// strictly greater than every later tally, so an exact tie resolves to the
/// stance that appeared first.
pub fn calculate_consensus(votes: &[Vote]) -> (ConsensusVerdict, f64) {
    let mut tallies: Vec<(Stance, u32)> = Vec::new();
    for vote in votes {
        let weight = vote.role.weight();
        match tallies.iter_mut().find(|(stance, _)| *stance == vote.stance) {
            Some((_, total)) => *total += weight,
            None => tallies.push((vote.stance, weight)),
        }
    }

    if tallies.is_empty() {
        return (ConsensusVerdict::Unverified, 0.0);
    }

    let total: u32 = tallies.iter().map(|(_, weight)| weight).sum();
    let (mut winner, mut best) = tallies[0];
    for &(stance, weight) in &tallies[1..] {
        if weight > best {
            winner = stance;
            best = weight;
        }
    }

    (winner.into(), (best as f64 / total as f64) * 100.0)
}

/// Sealed consensus record appended to the ledger when a vote threshold is
/// reached. `ledger_hash` commits to every other field except `anchor_ref`;
/// both are filled in during sealing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusSnapshot {
    pub claim_id: String,
    pub verdict: ConsensusVerdict,
    pub confidence: f64,
    pub votes: Vec<Vote>,
    pub threshold: usize,
    pub timestamp: DateTime<Utc>,
    pub ledger_hash: String,
    pub anchor_ref: String,
}

impl ConsensusSnapshot {
    /// SHA-256 over the canonical JSON form of this snapshot, excluding the
    /// hash itself and the anchor reference. Canonical means recursively
    /// key-sorted objects in compact encoding, so the digest is independent
    /// of field declaration order and map backing.
    pub fn canonical_hash(&self) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove("ledger_hash");
            map.remove("anchor_ref");
        }
        let canonical = canonicalize(&value).to_string();
        Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, inner)| (key.clone(), canonicalize(inner)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

//! Community Consensus Ledger: weighted voting, threshold-sealed snapshots,
//! canonical hashing, anchoring and the append-only ledger.

mod anchor;
mod engine;
mod ledger;
mod snapshot;
mod vote;

pub use anchor::{AnchorClient, HttpAnchor, NoopAnchor, UNANCHORED};
pub use engine::ConsensusEngine;
pub use ledger::{InMemoryLedger, LedgerStore};
pub use snapshot::{calculate_consensus, ConsensusSnapshot, ConsensusVerdict};
pub use vote::{Role, Stance, Vote};

/// Vote counts at which a consensus snapshot is sealed. The check is exact
/// equality, not greater-than.
pub const DEFAULT_VOTE_THRESHOLDS: [usize; 3] = [10, 50, 100];

//! Claim verification core.
//!
//! Two subsystems built around one evidence store:
//! - Evidence Cache & Aggregation: a deduplicated, embedded evidence cache
//!   merged with live platform lookups, feeding a judged verdict pipeline.
//! - Community Consensus Ledger: weighted review-room voting sealed into
//!   hash-committed snapshots at fixed vote thresholds, anchored in an
//!   external registry and fanned out to realtime subscribers.

pub mod cache;
pub mod config;
pub mod consensus;
pub mod embedding;
pub mod error;
pub mod evidence;
pub mod judgment;
pub mod logging;
pub mod pipeline;
pub mod realtime;
pub mod retry;

// Re-exports for convenience
pub use cache::EvidenceCache;
pub use consensus::ConsensusEngine;
pub use evidence::EvidenceAggregator;
pub use pipeline::ClaimVerifier;

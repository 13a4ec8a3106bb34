//! Failure taxonomy for the verification core.
//!
//! Every variant here is recovered locally with a documented neutral value;
//! these types exist so log lines and fallback branches can name the failure
//! class, not so callers can abort the claim pipeline.

use thiserror::Error;
use uuid::Uuid;

/// Failure classes the core recovers from.
#[derive(Debug, Error)]
pub enum VerityError {
    /// An evidence, judgment or anchoring collaborator failed or timed out.
    /// Recovered with an empty/neutral result at the call site.
    #[error("source '{source}' unavailable: {reason}")]
    SourceUnavailable {
        // r# opts the field out of thiserror's `source()` inference; it is
        // the platform name, not an error cause.
        r#source: String,
        reason: String,
    },

    /// The judgment collaborator returned output that could not be parsed.
    /// Retried per policy, then replaced by the neutral verdict.
    #[error("malformed judgment output: {0}")]
    MalformedJudgment(String),

    /// The persisted cache artifacts are missing, unreadable or misaligned.
    /// Recovered by resetting to an empty cache.
    #[error("evidence cache corruption: {0}")]
    CacheCorruption(String),

    /// A subscriber connection failed during delivery. Recovered by skipping
    /// that connection; the rest of the room is unaffected.
    #[error("connection {0} lost during broadcast")]
    ConnectionLost(Uuid),
}

impl VerityError {
    pub fn source_unavailable(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source: source.into(),
            reason: reason.into(),
        }
    }
}

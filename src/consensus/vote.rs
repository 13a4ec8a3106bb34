//! Votes and voter identity for community review rooms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reviewer role, weighted by editorial trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Contributor,
    Journalist,
    #[serde(rename = "fact-checker")]
    FactChecker,
}

impl Role {
    /// Vote weight applied during consensus tallies.
    pub fn weight(&self) -> u32 {
        match self {
            Role::Contributor => 1,
            Role::Journalist => 2,
            Role::FactChecker => 3,
        }
    }
}

/// Position a reviewer takes on a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Support,
    Refute,
    Misleading,
}

/// One cast vote. Wire payloads may omit the timestamp, in which case the
/// arrival time is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub user: String,
    pub role: Role,
    pub stance: Stance,
    #[serde(default = "chrono::Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Vote {
    pub fn new(user: impl Into<String>, role: Role, stance: Stance) -> Self {
        Self {
            user: user.into(),
            role,
            stance,
            timestamp: Utc::now(),
        }
    }
}

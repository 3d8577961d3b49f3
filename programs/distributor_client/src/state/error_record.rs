use std::fmt;

use serde::Serialize;

use crate::state::ShardId;

/// Collaborator an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorSource {
    Allowance,
    Authorization,
    Shard(ShardId),
    ClaimStatus,
    Claim,
}

impl fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowance => f.write_str("allowance"),
            Self::Authorization => f.write_str("authorization"),
            Self::Shard(id) => write!(f, "shard {id}"),
            Self::ClaimStatus => f.write_str("claim status"),
            Self::Claim => f.write_str("claim"),
        }
    }
}

/// An error as reported by a collaborator, before it is keyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub source: ErrorSource,
    pub message: String,
}

impl ErrorReport {
    pub fn new(source: ErrorSource, message: impl fmt::Display) -> Self {
        Self {
            source,
            message: message.to_string(),
        }
    }
}

/// An error held by the session error queue until dismissed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub key: u64,
    pub source: ErrorSource,
    pub message: String,
}

use thiserror::Error;

use crate::state::ShardId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DistributorClientError {
    // Data availability errors
    #[error("{origin} data unavailable: {reason}")]
    DataUnavailable { origin: &'static str, reason: String },
    #[error("allocation shard {shard_id} unavailable: {reason}")]
    ShardUnavailable { shard_id: ShardId, reason: String },
    #[error("no distribution contract configured for shard {0}")]
    UnknownShard(ShardId),

    // Validation errors
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("amount must not be negative")]
    NegativeAmount,
    #[error("amount does not fit in 128 bits")]
    AmountOverflow,
    #[error("invalid address")]
    InvalidAddress,
    #[error("no eligible allocation: shard id and index are required")]
    MissingEligibility,
    #[error("invalid proof element: {0}")]
    InvalidProofEncoding(String),
    #[error("proof does not match the allocation root")]
    InvalidProof,
    #[error("action is not ready: allowance is insufficient or still loading")]
    NotReady,

    // Submission errors
    #[error("transaction submission failed: {0}")]
    SubmissionFailed(String),
    #[error("transaction {tx} reverted: {reason}")]
    TransactionReverted { tx: String, reason: String },

    // System level errors
    #[error("transport error: {0}")]
    Transport(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("contract call encoding failed: {0}")]
    Encoding(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl DistributorClientError {
    /// Failures the user may retry after the state reverted.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SubmissionFailed(_)
                | Self::TransactionReverted { .. }
                | Self::Transport(_)
                | Self::DataUnavailable { .. }
                | Self::ShardUnavailable { .. }
        )
    }
}

impl From<reqwest::Error> for DistributorClientError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<serde_json::Error> for DistributorClientError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

impl From<std::io::Error> for DistributorClientError {
    fn from(value: std::io::Error) -> Self {
        Self::Encoding(value.to_string())
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::DistributorClientError;
use crate::state::{Address, RawAmount};

/// Position of a distribution contract in the configured distributor list.
pub type ShardId = u32;

/// One 32-byte node of a merkle membership proof.
pub type ProofNode = [u8; 32];

/**
 * Allocation record
 *
 * A participant's entry in one allocation shard. The `index` is the slot the
 * distribution contract marks as spent once claimed; `proof` is the merkle
 * path from the participant's leaf to the shard root.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRecord {
    pub index: u64,
    pub amount: RawAmount,
    pub proof: Vec<ProofNode>,
}

/**
 * Allocation shard
 *
 * Immutable mapping from participant address to allocation record, backed by
 * one distribution contract instance.
 *
 * Lifecycle:
 * 1. Fetched once per session on first need
 * 2. Shared read-only (behind `Arc`) by every consumer
 * 3. Dropped with the session cache; never mutated locally
 */
#[derive(Debug, Clone, Default)]
pub struct AllocationShard {
    shard_id: ShardId,
    claims: HashMap<Address, AllocationRecord>,
    merkle_root: Option<ProofNode>,
    token_total: Option<RawAmount>,
}

#[derive(Debug, Deserialize)]
struct ShardFile {
    #[serde(default)]
    claims: HashMap<String, RecordFile>,
    #[serde(rename = "merkleRoot", default)]
    merkle_root: Option<String>,
    #[serde(rename = "tokenTotal", default)]
    token_total: Option<RawAmount>,
}

#[derive(Debug, Deserialize)]
struct RecordFile {
    index: u64,
    amount: RawAmount,
    #[serde(default)]
    proof: Vec<String>,
}

impl AllocationShard {
    pub fn empty(shard_id: ShardId) -> Self {
        Self {
            shard_id,
            ..Self::default()
        }
    }

    pub fn with_claims(
        shard_id: ShardId,
        claims: impl IntoIterator<Item = (Address, AllocationRecord)>,
    ) -> Self {
        let mut shard = Self::empty(shard_id);
        for (address, record) in claims {
            shard.insert(address, record);
        }
        shard
    }

    pub fn with_merkle_root(mut self, root: ProofNode) -> Self {
        self.merkle_root = Some(root);
        self
    }

    /// Parses an allocation file (`{claims: {address: {index, amount, proof}}}`).
    pub fn from_json(shard_id: ShardId, payload: &[u8]) -> Result<Self, DistributorClientError> {
        let file: ShardFile = serde_json::from_slice(payload)?;

        let mut shard = Self::empty(shard_id);
        shard.token_total = file.token_total;
        shard.merkle_root = file
            .merkle_root
            .as_deref()
            .map(parse_proof_node)
            .transpose()?;

        for (raw_address, record) in file.claims {
            let address = Address::parse(&raw_address)?;
            let proof = record
                .proof
                .iter()
                .map(|node| parse_proof_node(node))
                .collect::<Result<Vec<_>, _>>()?;
            shard.insert(
                address,
                AllocationRecord {
                    index: record.index,
                    amount: record.amount,
                    proof,
                },
            );
        }
        Ok(shard)
    }

    // Keys that differ only in case collapse onto one address; the lowest
    // index wins so the result does not depend on map iteration order.
    fn insert(&mut self, address: Address, record: AllocationRecord) {
        match self.claims.get(&address) {
            Some(existing) if existing.index <= record.index => {}
            _ => {
                self.claims.insert(address, record);
            }
        }
    }

    pub fn shard_id(&self) -> ShardId {
        self.shard_id
    }

    pub fn get(&self, address: &Address) -> Option<&AllocationRecord> {
        self.claims.get(address)
    }

    pub fn merkle_root(&self) -> Option<&ProofNode> {
        self.merkle_root.as_ref()
    }

    pub fn token_total(&self) -> Option<RawAmount> {
        self.token_total
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

/// Decodes a `0x`-prefixed 32-byte hex node.
pub fn parse_proof_node(input: &str) -> Result<ProofNode, DistributorClientError> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    let bytes = hex::decode(digits)
        .map_err(|err| DistributorClientError::InvalidProofEncoding(format!("{input}: {err}")))?;
    ProofNode::try_from(bytes.as_slice()).map_err(|_| {
        DistributorClientError::InvalidProofEncoding(format!(
            "{input}: expected 32 bytes, got {}",
            bytes.len()
        ))
    })
}

/// Where a participant's allocation lives, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Eligibility {
    NotEligible,
    Eligible { shard_id: ShardId, index: u64 },
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible { .. })
    }

    pub fn shard_id(&self) -> Option<ShardId> {
        match self {
            Self::Eligible { shard_id, .. } => Some(*shard_id),
            Self::NotEligible => None,
        }
    }

    pub fn index(&self) -> Option<u64> {
        match self {
            Self::Eligible { index, .. } => Some(*index),
            Self::NotEligible => None,
        }
    }

    /// `(shard_id, index)`, both `None` when not eligible.
    pub fn as_pair(&self) -> (Option<ShardId>, Option<u64>) {
        (self.shard_id(), self.index())
    }
}

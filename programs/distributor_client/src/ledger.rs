//! Ledger interfaces consumed by the resolvers and submitters.
//!
//! The crate never talks to a node directly: reads and writes go through
//! [`LedgerReader`] and [`LedgerWriter`], with arguments and return values
//! Borsh-encoded through `anchor_lang`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use anchor_lang::prelude::{borsh, AnchorDeserialize, AnchorSerialize};
use serde::Serialize;

use crate::constants::*;
use crate::error::DistributorClientError;
use crate::state::{Address, ProofNode, RawAmount};
use crate::utils::encode_args;

/// Boxed future returned by the object-safe ledger traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Contract interface a call is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContractInterface {
    Erc20,
    MerkleDistributor,
}

/// A fully encoded contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub contract: Address,
    pub interface: ContractInterface,
    pub method: &'static str,
    pub args: Vec<u8>,
    pub gas_limit: Option<u64>,
}

impl ContractCall {
    pub fn new<T: AnchorSerialize>(
        contract: Address,
        interface: ContractInterface,
        method: &'static str,
        args: &T,
    ) -> Result<Self, DistributorClientError> {
        Ok(Self {
            contract,
            interface,
            method,
            args: encode_args(args)?,
            gas_limit: None,
        })
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Confirmed,
    Reverted { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx: TxHash,
    pub status: TxStatus,
}

/// Read side of the ledger.
pub trait LedgerReader: Send + Sync {
    /// Executes a read-only call and returns the encoded return value.
    fn read<'a>(&'a self, call: &'a ContractCall) -> BoxFuture<'a, Result<Vec<u8>, DistributorClientError>>;
}

/// Write side of the ledger.
pub trait LedgerWriter: Send + Sync {
    /// Signs and broadcasts a transaction.
    fn submit<'a>(&'a self, call: &'a ContractCall) -> BoxFuture<'a, Result<TxHash, DistributorClientError>>;

    /// Waits until the transaction is included and reports its status.
    fn confirm<'a>(&'a self, tx: &'a TxHash) -> BoxFuture<'a, Result<TxReceipt, DistributorClientError>>;
}

// ===== CALL ARGUMENTS =====

#[derive(Debug, Clone, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct AllowanceArgs {
    pub holder: String,
    pub spender: String,
}

#[derive(Debug, Clone, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct ApproveArgs {
    pub spender: String,
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct IsClaimedArgs {
    pub index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct ClaimArgs {
    pub index: u64,
    pub account: String,
    pub amount: u128,
    pub proof: Vec<ProofNode>,
}

pub fn allowance_call(
    token: &Address,
    holder: &Address,
    spender: &Address,
) -> Result<ContractCall, DistributorClientError> {
    ContractCall::new(
        token.clone(),
        ContractInterface::Erc20,
        ALLOWANCE_METHOD,
        &AllowanceArgs {
            holder: holder.to_string(),
            spender: spender.to_string(),
        },
    )
}

pub fn approve_call(
    token: &Address,
    spender: &Address,
    amount: RawAmount,
) -> Result<ContractCall, DistributorClientError> {
    ContractCall::new(
        token.clone(),
        ContractInterface::Erc20,
        APPROVE_METHOD,
        &ApproveArgs {
            spender: spender.to_string(),
            amount: amount.get(),
        },
    )
}

pub fn is_claimed_call(distributor: &Address, index: u64) -> Result<ContractCall, DistributorClientError> {
    ContractCall::new(
        distributor.clone(),
        ContractInterface::MerkleDistributor,
        IS_CLAIMED_METHOD,
        &IsClaimedArgs { index },
    )
}

pub fn claim_call(
    distributor: &Address,
    index: u64,
    account: &Address,
    amount: RawAmount,
    proof: &[ProofNode],
    gas_limit: u64,
) -> Result<ContractCall, DistributorClientError> {
    ContractCall::new(
        distributor.clone(),
        ContractInterface::MerkleDistributor,
        CLAIM_METHOD,
        &ClaimArgs {
            index,
            account: account.to_string(),
            amount: amount.get(),
            proof: proof.to_vec(),
        },
    )
    .map(|call| call.with_gas_limit(gas_limit))
}

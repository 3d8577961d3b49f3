pub mod test_eligibility;
pub mod test_error_queue;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::config::ClientConfig;
use crate::eligibility::ShardSource;
use crate::error::DistributorClientError;
use crate::ledger::{
    AllowanceArgs, ApproveArgs, BoxFuture, ClaimArgs, ContractCall, IsClaimedArgs, LedgerReader,
    LedgerWriter, TxHash, TxReceipt, TxStatus,
};
use crate::state::{Address, AllocationShard, ShardId};
use crate::utils::{decode_return, encode_args};

pub fn addr(input: &str) -> Address {
    Address::parse(input).unwrap()
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        distributors: vec![addr("0xd0"), addr("0xd1")],
        // Long enough that tests only observe reads they trigger.
        poll_interval_ms: 60_000,
        ..ClientConfig::default()
    }
}

/// In-memory ledger: ERC20 allowances plus a merkle distributor spent-bitmap.
///
/// Transactions are signed by `signer`. Effects apply on `confirm`, which can
/// be held with `hold_confirmations` to keep a submission in flight.
pub struct MockLedger {
    pub signer: Address,
    allowances: Mutex<HashMap<(Address, Address, Address), u128>>,
    claimed: Mutex<HashSet<(Address, u64)>>,
    read_failures: Mutex<HashMap<&'static str, DistributorClientError>>,
    submit_failure: Mutex<Option<DistributorClientError>>,
    revert_reason: Mutex<Option<String>>,
    submissions: Mutex<Vec<ContractCall>>,
    reads: AtomicUsize,
    hold: AtomicBool,
    release: Notify,
}

impl MockLedger {
    pub fn new(signer: Address) -> Arc<Self> {
        Arc::new(Self {
            signer,
            allowances: Mutex::new(HashMap::new()),
            claimed: Mutex::new(HashSet::new()),
            read_failures: Mutex::new(HashMap::new()),
            submit_failure: Mutex::new(None),
            revert_reason: Mutex::new(None),
            submissions: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
            hold: AtomicBool::new(false),
            release: Notify::new(),
        })
    }

    pub fn set_allowance(&self, token: &Address, holder: &Address, spender: &Address, amount: u128) {
        self.allowances
            .lock()
            .insert((token.clone(), holder.clone(), spender.clone()), amount);
    }

    pub fn allowance(&self, token: &Address, holder: &Address, spender: &Address) -> u128 {
        self.allowances
            .lock()
            .get(&(token.clone(), holder.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn mark_claimed(&self, distributor: &Address, index: u64) {
        self.claimed.lock().insert((distributor.clone(), index));
    }

    pub fn fail_reads(&self, method: &'static str, err: DistributorClientError) {
        self.read_failures.lock().insert(method, err);
    }

    pub fn heal_reads(&self, method: &'static str) {
        self.read_failures.lock().remove(method);
    }

    pub fn fail_submissions(&self, err: DistributorClientError) {
        *self.submit_failure.lock() = Some(err);
    }

    pub fn revert_with(&self, reason: &str) {
        *self.revert_reason.lock() = Some(reason.to_string());
    }

    pub fn hold_confirmations(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release_confirmations(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
        self.release.notify_one();
    }

    pub fn submissions(&self) -> Vec<ContractCall> {
        self.submissions.lock().clone()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Yields until `count` transactions have been submitted.
    pub async fn wait_for_submissions(&self, count: usize) {
        while self.submissions.lock().len() < count {
            tokio::task::yield_now().await;
        }
    }

    fn answer(&self, call: &ContractCall) -> Result<Vec<u8>, DistributorClientError> {
        if let Some(err) = self.read_failures.lock().get(call.method) {
            return Err(err.clone());
        }
        match call.method {
            "allowance" => {
                let args: AllowanceArgs = decode_return(&call.args)?;
                let holder = Address::parse(&args.holder)?;
                let spender = Address::parse(&args.spender)?;
                encode_args(&self.allowance(&call.contract, &holder, &spender))
            }
            "isClaimed" => {
                let args: IsClaimedArgs = decode_return(&call.args)?;
                let claimed = self
                    .claimed
                    .lock()
                    .contains(&(call.contract.clone(), args.index));
                encode_args(&claimed)
            }
            other => Err(DistributorClientError::Transport(format!("unknown read {other}"))),
        }
    }

    fn apply(&self, call: &ContractCall) -> Result<TxStatus, DistributorClientError> {
        if let Some(reason) = self.revert_reason.lock().clone() {
            return Ok(TxStatus::Reverted { reason });
        }
        match call.method {
            "approve" => {
                let args: ApproveArgs = decode_return(&call.args)?;
                let spender = Address::parse(&args.spender)?;
                self.set_allowance(&call.contract, &self.signer, &spender, args.amount);
                Ok(TxStatus::Confirmed)
            }
            "claim" => {
                let args: ClaimArgs = decode_return(&call.args)?;
                if !self.claimed.lock().insert((call.contract.clone(), args.index)) {
                    return Ok(TxStatus::Reverted {
                        reason: "MerkleDistributor: Drop already claimed.".into(),
                    });
                }
                Ok(TxStatus::Confirmed)
            }
            other => Err(DistributorClientError::SubmissionFailed(format!("unknown call {other}"))),
        }
    }
}

impl LedgerReader for MockLedger {
    fn read<'a>(&'a self, call: &'a ContractCall) -> BoxFuture<'a, Result<Vec<u8>, DistributorClientError>> {
        Box::pin(async move {
            self.reads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.answer(call)
        })
    }
}

impl LedgerWriter for MockLedger {
    fn submit<'a>(&'a self, call: &'a ContractCall) -> BoxFuture<'a, Result<TxHash, DistributorClientError>> {
        Box::pin(async move {
            if let Some(err) = self.submit_failure.lock().clone() {
                return Err(err);
            }
            let mut submissions = self.submissions.lock();
            submissions.push(call.clone());
            Ok(TxHash(format!("0xtx{}", submissions.len())))
        })
    }

    fn confirm<'a>(&'a self, tx: &'a TxHash) -> BoxFuture<'a, Result<TxReceipt, DistributorClientError>> {
        Box::pin(async move {
            while self.hold.load(Ordering::SeqCst) {
                self.release.notified().await;
            }
            let position = tx
                .0
                .trim_start_matches("0xtx")
                .parse::<usize>()
                .map_err(|_| DistributorClientError::SubmissionFailed(format!("unknown tx {tx}")))?;
            let call = self
                .submissions
                .lock()
                .get(position - 1)
                .cloned()
                .ok_or_else(|| DistributorClientError::SubmissionFailed(format!("unknown tx {tx}")))?;
            let status = self.apply(&call)?;
            Ok(TxReceipt {
                tx: tx.clone(),
                status,
            })
        })
    }
}

/// Shard host backed by a map; missing shards fail like a 404.
///
/// `hold_fetches` parks every fetch until `release_fetches`.
#[derive(Default)]
pub struct MockShardSource {
    shards: Mutex<HashMap<ShardId, AllocationShard>>,
    fetches: AtomicUsize,
    hold: AtomicBool,
    release: Notify,
}

impl MockShardSource {
    pub fn with_shards(shards: impl IntoIterator<Item = AllocationShard>) -> Arc<Self> {
        let source = Self::default();
        for shard in shards {
            source.shards.lock().insert(shard.shard_id(), shard);
        }
        Arc::new(source)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Replaces the published file for the shard's id.
    pub fn publish(&self, shard: AllocationShard) {
        self.shards.lock().insert(shard.shard_id(), shard);
    }

    pub fn hold_fetches(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release_fetches(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    /// Yields until `count` fetches have started.
    pub async fn wait_for_fetches(&self, count: usize) {
        while self.fetch_count() < count {
            tokio::task::yield_now().await;
        }
    }
}

impl ShardSource for MockShardSource {
    fn fetch(&self, shard_id: ShardId) -> BoxFuture<'_, Result<AllocationShard, DistributorClientError>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            while self.hold.load(Ordering::SeqCst) {
                let released = self.release.notified();
                if !self.hold.load(Ordering::SeqCst) {
                    break;
                }
                released.await;
            }
            tokio::task::yield_now().await;
            self.shards
                .lock()
                .get(&shard_id)
                .cloned()
                .ok_or_else(|| DistributorClientError::ShardUnavailable {
                    shard_id,
                    reason: "HTTP 404 Not Found".into(),
                })
        })
    }
}

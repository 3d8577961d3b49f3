use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::DistributorClientError;
use crate::error_queue::ErrorQueue;
use crate::event::{emit, ClientEvent};
use crate::gate::as_submission_failure;
use crate::ledger::{claim_call, is_claimed_call, LedgerReader, LedgerWriter, TxHash, TxStatus};
use crate::state::{
    Address, AllocationRecord, AllocationShard, ClaimState, Eligibility, ErrorReport, ErrorSource,
    ProofNode, RawAmount, ShardId,
};
use crate::utils::{allocation_leaf, decode_return, verify};
use crate::watch::{FetchFn, Snapshot, Watched};

/// Everything needed to submit one claim.
///
/// `shard_id` and `index` stay optional so a request built from a failed or
/// negative eligibility lookup is rejected at submission, not earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    pub shard_id: Option<ShardId>,
    pub index: Option<u64>,
    pub account: Address,
    pub amount: RawAmount,
    pub proof: Vec<ProofNode>,
    /// Shard root used for the optional local proof check.
    pub root: Option<ProofNode>,
}

impl ClaimRequest {
    pub fn for_allocation(shard: &AllocationShard, account: Address, record: &AllocationRecord) -> Self {
        Self {
            shard_id: Some(shard.shard_id()),
            index: Some(record.index),
            account,
            amount: record.amount,
            proof: record.proof.clone(),
            root: shard.merkle_root().copied(),
        }
    }

    pub fn eligibility(&self) -> Eligibility {
        match (self.shard_id, self.index) {
            (Some(shard_id), Some(index)) => Eligibility::Eligible { shard_id, index },
            _ => Eligibility::NotEligible,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed { tx: TxHash },
    /// The slot was already spent on-chain; nothing (more) to do.
    AlreadyClaimed,
    /// A claim for the same slot is already in flight.
    Suppressed,
}

/// State object rendered by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimControl {
    pub state: ClaimState,
    pub enabled: bool,
    pub eligibility: Eligibility,
    pub error: Option<String>,
}

/// One claimable slot: the distributor behind `shard_id` and the `index`
/// in its spent bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClaimKey {
    pub shard_id: ShardId,
    pub index: u64,
}

/// Session-wide set of claim slots with a transaction in flight.
#[derive(Debug, Clone, Default)]
pub struct ClaimRegistry {
    in_flight: Arc<Mutex<HashSet<ClaimKey>>>,
}

impl ClaimRegistry {
    /// Claims `key`; `None` if a claim for the slot is already in flight.
    pub fn try_acquire(&self, key: ClaimKey) -> Option<ClaimGuard> {
        if !self.in_flight.lock().insert(key) {
            return None;
        }
        Some(ClaimGuard {
            in_flight: Arc::clone(&self.in_flight),
            key,
        })
    }

    pub fn is_in_flight(&self, key: &ClaimKey) -> bool {
        self.in_flight.lock().contains(key)
    }
}

/// Releases its slot when dropped, on every exit path of a submission.
pub struct ClaimGuard {
    in_flight: Arc<Mutex<HashSet<ClaimKey>>>,
    key: ClaimKey,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}

/**
 * Claim submitter
 *
 * Watches `isClaimed(index)` on the distribution contract backing the
 * participant's shard and submits `claim(index, account, amount, proof)`
 * exactly once per activation.
 *
 * Guarantees:
 * - At most one claim transaction in flight per slot across every submitter
 *   sharing the registry; extra activations are suppressed
 * - A guarding `isClaimed` read is issued right before submission, so a slot
 *   spent elsewhere is reported as `AlreadyClaimed` instead of reverting
 * - The claimed flag is only ever learnt from the ledger
 */
pub struct ClaimSubmitter {
    reader: Arc<dyn LedgerReader>,
    writer: Arc<dyn LedgerWriter>,
    distributors: Vec<Address>,
    gas_limit: u64,
    verify_proofs: bool,
    errors: ErrorQueue,
    events: broadcast::Sender<ClientEvent>,
    target: Mutex<Eligibility>,
    claimed: Watched<bool>,
    registry: ClaimRegistry,
}

impl ClaimSubmitter {
    pub fn new(
        reader: Arc<dyn LedgerReader>,
        writer: Arc<dyn LedgerWriter>,
        config: &ClientConfig,
        registry: ClaimRegistry,
        errors: ErrorQueue,
        events: broadcast::Sender<ClientEvent>,
        runtime: Handle,
    ) -> Self {
        Self {
            reader,
            writer,
            distributors: config.distributors.clone(),
            gas_limit: config.claim_gas_limit,
            verify_proofs: config.verify_proofs,
            claimed: Watched::new(
                runtime,
                config.poll_interval(),
                Some((errors.clone(), ErrorSource::ClaimStatus)),
            ),
            errors,
            events,
            target: Mutex::new(Eligibility::NotEligible),
            registry,
        }
    }

    fn distributor(&self, shard_id: ShardId) -> Result<&Address, DistributorClientError> {
        self.distributors
            .get(shard_id as usize)
            .ok_or(DistributorClientError::UnknownShard(shard_id))
    }

    /// One-shot `isClaimed` read.
    pub async fn is_claimed(&self, shard_id: ShardId, index: u64) -> Result<bool, DistributorClientError> {
        let call = is_claimed_call(self.distributor(shard_id)?, index)?;
        let payload = self.reader.read(&call).await?;
        decode_return::<bool>(&payload)
    }

    /// Points the claimed-flag watch at `eligibility`, or idles it when not
    /// eligible. Shard 0 and index 0 are valid targets.
    pub fn watch_claimed(&self, eligibility: Eligibility) -> Result<(), DistributorClientError> {
        let mut target = self.target.lock();
        if *target == eligibility && (!eligibility.is_eligible() || self.claimed.is_watching()) {
            return Ok(());
        }
        match eligibility {
            Eligibility::Eligible { shard_id, index } => {
                let fetch = self.fetch_claimed(shard_id, index)?;
                debug!(shard_id, index, "watching claim status");
                *target = eligibility;
                self.claimed.start(fetch);
            }
            Eligibility::NotEligible => {
                *target = eligibility;
                self.claimed.stop();
            }
        }
        Ok(())
    }

    fn fetch_claimed(&self, shard_id: ShardId, index: u64) -> Result<FetchFn<bool>, DistributorClientError> {
        let reader = Arc::clone(&self.reader);
        let call = is_claimed_call(self.distributor(shard_id)?, index)?;
        Ok(Arc::new(move || {
            let reader = Arc::clone(&reader);
            let call = call.clone();
            Box::pin(async move {
                let payload = reader.read(&call).await?;
                decode_return::<bool>(&payload)
            })
        }))
    }

    pub fn claimed_snapshot(&self) -> Snapshot<bool> {
        self.claimed.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<bool>> {
        self.claimed.subscribe()
    }

    /// Whether a claim for the watched slot is in flight anywhere in the
    /// registry.
    pub fn is_submitting(&self) -> bool {
        match *self.target.lock() {
            Eligibility::Eligible { shard_id, index } => {
                self.registry.is_in_flight(&ClaimKey { shard_id, index })
            }
            Eligibility::NotEligible => false,
        }
    }

    pub fn state(&self) -> ClaimState {
        ClaimState::derive(self.is_submitting(), self.claimed.snapshot().value)
    }

    /// Enabled only for a watched target whose `isClaimed` read has landed
    /// and reported false, with no submission in flight.
    pub fn control(&self) -> ClaimControl {
        let eligibility = *self.target.lock();
        let snapshot = self.claimed.snapshot();
        let in_flight = self.is_submitting();
        let enabled = eligibility.is_eligible()
            && !snapshot.loading
            && snapshot.value == Some(false)
            && !in_flight;
        ClaimControl {
            state: ClaimState::derive(in_flight, snapshot.value),
            enabled,
            eligibility,
            error: snapshot.error.map(|err| err.to_string()),
        }
    }

    pub async fn submit_claim(&self, request: &ClaimRequest) -> Result<ClaimOutcome, DistributorClientError> {
        let (Some(shard_id), Some(index)) = (request.shard_id, request.index) else {
            return Err(DistributorClientError::MissingEligibility);
        };
        let distributor = self.distributor(shard_id)?.clone();
        if self.verify_proofs {
            if let Some(root) = &request.root {
                let leaf = allocation_leaf(index, &request.account, request.amount);
                if !leaf.is_some_and(|leaf| verify(&request.proof, root, leaf)) {
                    return Err(self.record_failure(DistributorClientError::InvalidProof));
                }
            }
        }

        let Some(_in_flight) = self.registry.try_acquire(ClaimKey { shard_id, index }) else {
            debug!(shard_id, index, "claim already in flight");
            return Ok(ClaimOutcome::Suppressed);
        };

        if self.guard_claimed(shard_id, index).await? {
            return Ok(self.already_settled(&distributor, shard_id, index));
        }

        let call = claim_call(
            &distributor,
            index,
            &request.account,
            request.amount,
            &request.proof,
            self.gas_limit,
        )?;
        info!(%distributor, shard_id, index, account = %request.account, "submitting claim");
        let tx = self
            .writer
            .submit(&call)
            .await
            .map_err(|err| self.record_failure(as_submission_failure(err)))?;
        emit(
            &self.events,
            ClientEvent::ClaimSubmitted {
                distributor: distributor.clone(),
                shard_id,
                index,
                claimant: request.account.clone(),
                amount: request.amount,
                tx: tx.clone(),
            },
        );

        let receipt = self
            .writer
            .confirm(&tx)
            .await
            .map_err(|err| self.record_failure(as_submission_failure(err)))?;
        if let TxStatus::Reverted { reason } = receipt.status {
            // A claim racing ours may have spent the slot first.
            if matches!(self.is_claimed(shard_id, index).await, Ok(true)) {
                return Ok(self.already_settled(&distributor, shard_id, index));
            }
            return Err(self.record_failure(DistributorClientError::TransactionReverted {
                tx: tx.to_string(),
                reason,
            }));
        }

        let watched = *self.target.lock() == request.eligibility();
        if watched {
            self.claimed.refresh().await;
        }
        info!(%tx, shard_id, index, "claim confirmed");
        emit(
            &self.events,
            ClientEvent::ClaimConfirmed {
                distributor,
                shard_id,
                index,
                claimant: request.account.clone(),
                amount: request.amount,
                tx: tx.clone(),
            },
        );
        Ok(ClaimOutcome::Claimed { tx })
    }

    async fn guard_claimed(&self, shard_id: ShardId, index: u64) -> Result<bool, DistributorClientError> {
        self.is_claimed(shard_id, index).await.map_err(|err| {
            warn!(shard_id, index, error = %err, "claim status read failed");
            self.errors
                .add_error(ErrorReport::new(ErrorSource::ClaimStatus, &err));
            err
        })
    }

    fn already_settled(&self, distributor: &Address, shard_id: ShardId, index: u64) -> ClaimOutcome {
        info!(shard_id, index, "allocation already claimed");
        emit(
            &self.events,
            ClientEvent::ClaimAlreadySettled {
                distributor: distributor.clone(),
                shard_id,
                index,
            },
        );
        ClaimOutcome::AlreadyClaimed
    }

    fn record_failure(&self, err: DistributorClientError) -> DistributorClientError {
        warn!(error = %err, "claim failed");
        self.errors.add_error(ErrorReport::new(ErrorSource::Claim, &err));
        err
    }
}

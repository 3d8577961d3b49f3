use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::info;

use crate::allowance::AllowanceResolver;
use crate::claim::{ClaimRegistry, ClaimRequest, ClaimSubmitter};
use crate::config::ClientConfig;
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::eligibility::{EligibilityResolver, HttpShardSource, ShardSource};
use crate::error::DistributorClientError;
use crate::error_queue::ErrorQueue;
use crate::event::ClientEvent;
use crate::gate::{ApprovalGate, ApprovalRegistry};
use crate::ledger::{LedgerReader, LedgerWriter};
use crate::state::{Address, Eligibility, ErrorRecord, RequiredAmount};

/**
 * Client session
 *
 * Owns everything that lives as long as one mounted session: the error
 * queue, the event channel, the in-flight authorization and claim registries
 * and the shard cache. Resolvers, gates and submitters are created from it and share
 * those pieces; dropping them stops their watches.
 *
 * Must be created inside a Tokio runtime. Watches spawn onto that runtime, so
 * the session's methods may be called from any thread afterwards.
 */
pub struct Session {
    config: ClientConfig,
    reader: Arc<dyn LedgerReader>,
    writer: Arc<dyn LedgerWriter>,
    errors: ErrorQueue,
    events: broadcast::Sender<ClientEvent>,
    approvals: ApprovalRegistry,
    claims: ClaimRegistry,
    eligibility: Arc<EligibilityResolver>,
    runtime: Handle,
}

impl Session {
    pub fn new(
        config: ClientConfig,
        reader: Arc<dyn LedgerReader>,
        writer: Arc<dyn LedgerWriter>,
        shards: Arc<dyn ShardSource>,
    ) -> Result<Self, DistributorClientError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|err| {
            DistributorClientError::Configuration(format!("session needs a Tokio runtime: {err}"))
        })?;
        let errors = ErrorQueue::new();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let eligibility = Arc::new(EligibilityResolver::new(
            shards,
            config.shard_ids(),
            errors.clone(),
            events.clone(),
        ));
        info!(
            network = %config.network,
            chain_id = config.chain_id(),
            shards = config.distributors.len(),
            "session opened"
        );
        Ok(Self {
            config,
            reader,
            writer,
            errors,
            events,
            approvals: ApprovalRegistry::default(),
            claims: ClaimRegistry::default(),
            eligibility,
            runtime,
        })
    }

    /// Session whose allocation files are fetched over HTTP.
    pub fn connect(
        config: ClientConfig,
        reader: Arc<dyn LedgerReader>,
        writer: Arc<dyn LedgerWriter>,
    ) -> Result<Self, DistributorClientError> {
        let shards = Arc::new(HttpShardSource::new(&config)?);
        Self::new(config, reader, writer, shards)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn errors(&self) -> &ErrorQueue {
        &self.errors
    }

    pub fn error_records(&self) -> Vec<ErrorRecord> {
        self.errors.errors()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn eligibility(&self) -> &Arc<EligibilityResolver> {
        &self.eligibility
    }

    /// Starts an allowance watch for `holder` on `token`.
    pub fn resolve_allowance(
        &self,
        token: Address,
        spender: Address,
        holder: Option<Address>,
    ) -> Arc<AllowanceResolver> {
        let resolver = Arc::new(AllowanceResolver::new(
            Arc::clone(&self.reader),
            token,
            spender,
            self.config.poll_interval(),
            self.errors.clone(),
            self.runtime.clone(),
        ));
        resolver.set_holder(holder);
        resolver
    }

    pub fn approval_gate(
        &self,
        resolver: Arc<AllowanceResolver>,
        required: &RequiredAmount,
    ) -> Result<ApprovalGate, DistributorClientError> {
        ApprovalGate::new(
            resolver,
            Arc::clone(&self.writer),
            required,
            self.approvals.clone(),
            self.errors.clone(),
            self.events.clone(),
        )
    }

    pub fn claim_submitter(&self) -> ClaimSubmitter {
        ClaimSubmitter::new(
            Arc::clone(&self.reader),
            Arc::clone(&self.writer),
            &self.config,
            self.claims.clone(),
            self.errors.clone(),
            self.events.clone(),
            self.runtime.clone(),
        )
    }

    pub async fn find_eligibility(&self, account: &Address) -> Eligibility {
        self.eligibility.find_eligibility(account).await
    }

    /// Claim request for `account`, or `None` when it holds no allocation in
    /// any loaded shard.
    pub async fn prepare_claim(&self, account: &Address) -> Option<ClaimRequest> {
        self.eligibility
            .allocation(account)
            .await
            .map(|(shard, record)| ClaimRequest::for_allocation(&shard, account.clone(), &record))
    }

    /// Tears the session down: drops queued errors and the shard cache.
    pub fn close(&self) {
        self.errors.clear();
        self.eligibility.reset();
        info!("session closed");
    }
}

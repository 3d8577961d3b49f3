use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::{broadcast, OnceCell};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::DistributorClientError;
use crate::error_queue::ErrorQueue;
use crate::event::{emit, ClientEvent};
use crate::ledger::BoxFuture;
use crate::state::{
    Address, AllocationRecord, AllocationShard, Eligibility, ErrorReport, ErrorSource, ShardId,
};
use crate::utils::{allocation_leaf, verify};

/// Where allocation files come from.
pub trait ShardSource: Send + Sync {
    fn fetch(&self, shard_id: ShardId) -> BoxFuture<'_, Result<AllocationShard, DistributorClientError>>;
}

/// Fetches `<base>/<root>/<network>-<shard_id>.json` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpShardSource {
    client: reqwest::Client,
    base_url: String,
    root: String,
    network: String,
}

impl HttpShardSource {
    pub fn new(config: &ClientConfig) -> Result<Self, DistributorClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.distribution_base_url.trim_end_matches('/').to_string(),
            root: config.distribution_root.trim_matches('/').to_string(),
            network: config.network.clone(),
        })
    }

    pub fn url(&self, shard_id: ShardId) -> String {
        if self.root.is_empty() {
            format!("{}/{}-{}.json", self.base_url, self.network, shard_id)
        } else {
            format!("{}/{}/{}-{}.json", self.base_url, self.root, self.network, shard_id)
        }
    }
}

impl ShardSource for HttpShardSource {
    fn fetch(&self, shard_id: ShardId) -> BoxFuture<'_, Result<AllocationShard, DistributorClientError>> {
        Box::pin(async move {
            let url = self.url(shard_id);
            debug!(shard_id, %url, "fetching allocation file");
            let response = self.client.get(&url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(DistributorClientError::ShardUnavailable {
                    shard_id,
                    reason: format!("HTTP {status} from {url}"),
                });
            }
            let body = response.bytes().await?;
            AllocationShard::from_json(shard_id, &body)
        })
    }
}

/// Shards loaded for a session, plus the ones that failed.
#[derive(Debug, Clone, Default)]
pub struct ShardSet {
    shards: BTreeMap<ShardId, Arc<AllocationShard>>,
    failures: BTreeMap<ShardId, DistributorClientError>,
}

impl ShardSet {
    pub fn from_shards(shards: impl IntoIterator<Item = AllocationShard>) -> Self {
        let mut set = Self::default();
        for shard in shards {
            set.insert(shard);
        }
        set
    }

    pub fn insert(&mut self, shard: AllocationShard) {
        self.failures.remove(&shard.shard_id());
        self.shards.insert(shard.shard_id(), Arc::new(shard));
    }

    pub fn shard(&self, shard_id: ShardId) -> Option<&Arc<AllocationShard>> {
        self.shards.get(&shard_id)
    }

    pub fn failures(&self) -> &BTreeMap<ShardId, DistributorClientError> {
        &self.failures
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}

/// First shard, in ascending shard id, holding `address`.
pub fn find_allocation<'a>(
    set: &'a ShardSet,
    address: &Address,
) -> Option<(&'a Arc<AllocationShard>, &'a AllocationRecord)> {
    set.shards
        .values()
        .find_map(|shard| shard.get(address).map(|record| (shard, record)))
}

/// Eligibility of `address`; stops at the first shard that lists it, so a
/// participant listed twice is only ever counted once.
pub fn find_eligibility(set: &ShardSet, address: &Address) -> Eligibility {
    match find_allocation(set, address) {
        Some((shard, record)) => Eligibility::Eligible {
            shard_id: shard.shard_id(),
            index: record.index,
        },
        None => Eligibility::NotEligible,
    }
}

/// Checks `record`'s proof against the shard root. Shards without a
/// published root are accepted as-is.
pub fn verify_allocation(
    shard: &AllocationShard,
    address: &Address,
    record: &AllocationRecord,
) -> Result<(), DistributorClientError> {
    let Some(root) = shard.merkle_root() else {
        return Ok(());
    };
    let leaf = allocation_leaf(record.index, address, record.amount);
    if leaf.is_some_and(|leaf| verify(&record.proof, root, leaf)) {
        Ok(())
    } else {
        Err(DistributorClientError::InvalidProof)
    }
}

/**
 * Eligibility resolver
 *
 * Loads every configured allocation shard in parallel, once per session.
 * A shard that cannot be fetched is reported (error queue + event) and left
 * out; lookups still run against the shards that did load.
 *
 * Concurrent callers share one load. `reset` swaps in a fresh cache; a load
 * that started before the reset is discarded and redone.
 */
pub struct EligibilityResolver {
    source: Arc<dyn ShardSource>,
    shard_ids: Vec<ShardId>,
    errors: ErrorQueue,
    events: broadcast::Sender<ClientEvent>,
    cache: Mutex<Arc<OnceCell<Arc<ShardSet>>>>,
}

impl EligibilityResolver {
    pub fn new(
        source: Arc<dyn ShardSource>,
        shard_ids: impl IntoIterator<Item = ShardId>,
        errors: ErrorQueue,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            source,
            shard_ids: shard_ids.into_iter().collect(),
            errors,
            events,
            cache: Mutex::new(Arc::new(OnceCell::new())),
        }
    }

    fn current_cell(&self) -> Arc<OnceCell<Arc<ShardSet>>> {
        Arc::clone(&self.cache.lock())
    }

    pub async fn load_shards(&self) -> Arc<ShardSet> {
        loop {
            let cell = self.current_cell();
            let set = Arc::clone(cell.get_or_init(|| self.fetch_all()).await);
            if Arc::ptr_eq(&cell, &self.current_cell()) {
                return set;
            }
            debug!("shard cache reset during load, reloading");
        }
    }

    pub fn cached(&self) -> Option<Arc<ShardSet>> {
        self.current_cell().get().cloned()
    }

    pub fn reset(&self) {
        *self.cache.lock() = Arc::new(OnceCell::new());
    }

    async fn fetch_all(&self) -> Arc<ShardSet> {
        let fetches = self
            .shard_ids
            .iter()
            .map(|&shard_id| async move { (shard_id, self.source.fetch(shard_id).await) });

        let mut set = ShardSet::default();
        for (shard_id, outcome) in join_all(fetches).await {
            match outcome {
                Ok(shard) if shard.shard_id() == shard_id => set.insert(shard),
                Ok(shard) => self.record_failure(
                    &mut set,
                    shard_id,
                    DistributorClientError::ShardUnavailable {
                        shard_id,
                        reason: format!("source returned shard {}", shard.shard_id()),
                    },
                ),
                Err(err) => self.record_failure(&mut set, shard_id, err),
            }
        }
        info!(
            loaded = set.len(),
            failed = set.failures.len(),
            "allocation shards loaded"
        );
        Arc::new(set)
    }

    fn record_failure(&self, set: &mut ShardSet, shard_id: ShardId, err: DistributorClientError) {
        warn!(shard_id, error = %err, "allocation file unavailable");
        self.errors
            .add_error(ErrorReport::new(ErrorSource::Shard(shard_id), &err));
        emit(
            &self.events,
            ClientEvent::ShardUnavailable {
                shard_id,
                reason: err.to_string(),
            },
        );
        set.failures.insert(shard_id, err);
    }

    pub async fn find_eligibility(&self, address: &Address) -> Eligibility {
        let set = self.load_shards().await;
        find_eligibility(&set, address)
    }

    /// The shard and record `address` would claim from.
    pub async fn allocation(&self, address: &Address) -> Option<(Arc<AllocationShard>, AllocationRecord)> {
        let set = self.load_shards().await;
        find_allocation(&set, address).map(|(shard, record)| (Arc::clone(shard), record.clone()))
    }
}

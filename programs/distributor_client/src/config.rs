use std::time::Duration;

use serde::Deserialize;

use crate::constants::*;
use crate::error::DistributorClientError;
use crate::state::{Address, ShardId};

/// Client configuration.
///
/// `distributors` lists one distribution contract per allocation shard; the
/// shard id is the contract's position in the list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub network: String,
    pub distribution_base_url: String,
    pub distribution_root: String,
    pub distributors: Vec<Address>,
    pub claim_gas_limit: u64,
    pub poll_interval_ms: u64,
    pub fetch_timeout_ms: u64,
    pub verify_proofs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: "mainnet".to_string(),
            distribution_base_url: DEFAULT_DISTRIBUTION_BASE_URL.to_string(),
            distribution_root: DEFAULT_DISTRIBUTION_ROOT.to_string(),
            distributors: Vec::new(),
            claim_gas_limit: DEFAULT_CLAIM_GAS_LIMIT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            verify_proofs: false,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `DISTRIBUTOR_CLIENT_*` environment variables.
    pub fn from_env() -> Result<Self, DistributorClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DistributorClientError> {
        let mut cfg = Self::default();
        if let Some(v) = lookup("DISTRIBUTOR_CLIENT_NETWORK") {
            cfg.network = v;
        }
        if let Some(v) = lookup("DISTRIBUTOR_CLIENT_BASE_URL") {
            cfg.distribution_base_url = v;
        }
        if let Some(v) = lookup("DISTRIBUTOR_CLIENT_DISTRIBUTION_ROOT") {
            cfg.distribution_root = v;
        }
        if let Some(v) = lookup("DISTRIBUTOR_CLIENT_DISTRIBUTORS") {
            cfg.distributors = v
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(Address::parse)
                .collect::<Result<_, _>>()?;
        }
        if let Some(v) = lookup("DISTRIBUTOR_CLIENT_CLAIM_GAS_LIMIT") {
            cfg.claim_gas_limit = parse_number("DISTRIBUTOR_CLIENT_CLAIM_GAS_LIMIT", &v)?;
        }
        if let Some(v) = lookup("DISTRIBUTOR_CLIENT_POLL_INTERVAL_MS") {
            cfg.poll_interval_ms = parse_number("DISTRIBUTOR_CLIENT_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("DISTRIBUTOR_CLIENT_FETCH_TIMEOUT_MS") {
            cfg.fetch_timeout_ms = parse_number("DISTRIBUTOR_CLIENT_FETCH_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("DISTRIBUTOR_CLIENT_VERIFY_PROOFS") {
            cfg.verify_proofs = parse_flag("DISTRIBUTOR_CLIENT_VERIFY_PROOFS", &v)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), DistributorClientError> {
        if self.network.trim().is_empty() {
            return Err(DistributorClientError::Configuration("network must be set".into()));
        }
        if self.distribution_base_url.trim().is_empty() {
            return Err(DistributorClientError::Configuration(
                "distribution_base_url must be set".into(),
            ));
        }
        if self.claim_gas_limit == 0 {
            return Err(DistributorClientError::Configuration(
                "claim_gas_limit must be positive".into(),
            ));
        }
        if self.poll_interval_ms == 0 || self.fetch_timeout_ms == 0 {
            return Err(DistributorClientError::Configuration(
                "poll_interval_ms and fetch_timeout_ms must be positive".into(),
            ));
        }
        if self.distributors.len() > ShardId::MAX as usize {
            return Err(DistributorClientError::Configuration("too many distributors".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn shard_ids(&self) -> impl Iterator<Item = ShardId> + '_ {
        (0..self.distributors.len()).map(|id| id as ShardId)
    }

    pub fn distributor(&self, shard_id: ShardId) -> Option<&Address> {
        self.distributors.get(shard_id as usize)
    }

    /// Chain id for the configured network; unknown names fall back to mainnet.
    pub fn chain_id(&self) -> u64 {
        match self.network.to_ascii_lowercase().as_str() {
            "mainnet" | "ethereum" => 1,
            "goerli" => 5,
            _ => 1,
        }
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, DistributorClientError> {
    value
        .trim()
        .parse()
        .map_err(|_| DistributorClientError::Configuration(format!("{key}: not a number: {value}")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, DistributorClientError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(DistributorClientError::Configuration(format!(
            "{key}: not a boolean: {value}"
        ))),
    }
}

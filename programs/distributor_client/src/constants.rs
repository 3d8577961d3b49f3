/**
 * Client Constants
 *
 * This module defines the constant values shared by the gate, the eligibility
 * resolver and the claim submitter. They control polling cadence, contract
 * method names and the transaction overrides applied to claims.
 */

/// ===== TIMING CONSTANTS =====

/// Default interval between two reads of a watched ledger value (4 seconds)
/// - Applied by every resolver that keeps a value fresh
/// - `refresh()` bypasses the interval for post-confirmation reads
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 4_000;

/// Default timeout for fetching one allocation file (10 seconds)
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// ===== TRANSACTION OVERRIDES =====

/// Fixed gas limit attached to every claim transaction
/// - Claims have a bounded cost (one proof walk, one transfer)
/// - Overridable through `ClientConfig::claim_gas_limit`
pub const DEFAULT_CLAIM_GAS_LIMIT: u64 = 150_000;

/// ===== ALLOCATION FILES =====

/// Directory the allocation files are served from
/// - Used in: `<base>/<root>/<network>-<shard_id>.json`
pub const DEFAULT_DISTRIBUTION_ROOT: &str = "tweetdrop";

/// Default host serving the allocation files
pub const DEFAULT_DISTRIBUTION_BASE_URL: &str = "http://localhost:3000";

/// ===== CONTRACT INTERFACE =====

/// Asset contract: `allowance(holder, spender) -> u128`
pub const ALLOWANCE_METHOD: &str = "allowance";

/// Asset contract: `approve(spender, amount)`
pub const APPROVE_METHOD: &str = "approve";

/// Distribution contract: `isClaimed(index) -> bool`
pub const IS_CLAIMED_METHOD: &str = "isClaimed";

/// Distribution contract: `claim(index, account, amount, proof)`
pub const CLAIM_METHOD: &str = "claim";

/// ===== SESSION =====

/// Capacity of the session event channel
/// - Slow subscribers lag and skip events rather than blocking producers
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/*!
 * Token Distributor Client
 *
 * Client-side sequencing for allowance-gated actions and merkle distribution
 * claims. The crate decides when an authorization is needed, which allocation
 * record belongs to a participant and how to keep submissions from being
 * duplicated or sent early. Ledger access and allocation file hosting are
 * consumed through traits.
 *
 * Key Features:
 * - Watched allowance reads with last-request-wins cancellation
 * - One control at a time per gated action: authorize or perform, never both
 * - At most one in-flight authorization per (holder, spender, asset) triple
 * - Parallel, session-cached loading of sharded allocation files that
 *   tolerates individual shard failures
 * - Exactly-once claim submission guarded by an on-chain `isClaimed` read
 * - Session-wide error queue fed by every asynchronous collaborator
 *
 * Workflow:
 * 1. Open a `Session` with a ledger reader, writer and shard source
 * 2. Resolve the allowance and wrap the dependent action in an `ApprovalGate`
 * 3. Look up the participant's eligibility and build a `ClaimRequest`
 * 4. Watch `isClaimed` and submit through a `ClaimSubmitter`
 * 5. Render controls, errors and events; `close` the session on teardown
 */

pub mod allowance;
pub mod claim;
pub mod config;
pub mod constants;
pub mod eligibility;
pub mod error;
pub mod error_queue;
pub mod event;
pub mod gate;
pub mod ledger;
pub mod session;
pub mod state;
pub mod utils;
pub mod watch;

#[cfg(test)]
pub mod test;

pub use allowance::{AllowanceResolver, AllowanceState};
pub use claim::{ClaimControl, ClaimKey, ClaimOutcome, ClaimRegistry, ClaimRequest, ClaimSubmitter};
pub use config::ClientConfig;
pub use eligibility::{EligibilityResolver, HttpShardSource, ShardSet, ShardSource};
pub use error::DistributorClientError;
pub use error_queue::ErrorQueue;
pub use event::ClientEvent;
pub use gate::{ApprovalGate, ApprovalOutcome, ApprovalRegistry, GateControl, GateMode, GateOutcome};
pub use ledger::{ContractCall, LedgerReader, LedgerWriter, TxHash, TxReceipt, TxStatus};
pub use session::Session;
pub use state::*;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::ledger::TxHash;
use crate::state::{Address, RawAmount, ShardId};

/// Events broadcast to the presentation layer of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Emitted when an authorization transaction has been broadcast
    AuthorizationSubmitted {
        /// Asset contract the allowance is granted on
        token: Address,
        /// Account allowed to move the holder's tokens
        spender: Address,
        /// Account granting the allowance
        holder: Address,
        /// Raw amount authorized
        amount: RawAmount,
        tx: TxHash,
    },

    /// Emitted once the authorization is confirmed and the allowance re-read
    AuthorizationConfirmed {
        token: Address,
        spender: Address,
        holder: Address,
        /// Allowance observed after confirmation
        allowance: Option<RawAmount>,
        tx: TxHash,
    },

    /// Emitted when a claim transaction has been broadcast
    ClaimSubmitted {
        /// Distribution contract backing the shard
        distributor: Address,
        shard_id: ShardId,
        /// Allocation slot being claimed
        index: u64,
        claimant: Address,
        amount: RawAmount,
        tx: TxHash,
    },

    /// Emitted when a claim transaction is confirmed
    ClaimConfirmed {
        distributor: Address,
        shard_id: ShardId,
        index: u64,
        claimant: Address,
        amount: RawAmount,
        tx: TxHash,
    },

    /// Emitted when the guarding read finds the slot already spent
    ClaimAlreadySettled {
        distributor: Address,
        shard_id: ShardId,
        index: u64,
    },

    /// Emitted when an allocation file could not be loaded
    ShardUnavailable {
        shard_id: ShardId,
        /// Human-readable failure reason
        reason: String,
    },
}

/// Broadcasts `event`; having no subscriber is not an error.
pub fn emit(events: &broadcast::Sender<ClientEvent>, event: ClientEvent) {
    debug!(?event, "client event");
    let _ = events.send(event);
}

use serde::Serialize;

/**
 * Claim state of one allocation slot
 *
 * Lifecycle:
 * 1. Unclaimed until the participant activates the claim control
 * 2. InFlight while the claim transaction is submitted and awaiting confirmation
 * 3. Claimed once the distribution contract reports the index as spent,
 *    otherwise back to Unclaimed
 *
 * Design Notes:
 * - Only InFlight is tracked locally; Claimed always comes from a ledger read
 * - The contract's own spent-bitmap prevents double payout even when the
 *   local view is stale
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClaimState {
    #[default]
    Unclaimed,
    InFlight,
    Claimed,
}

impl ClaimState {
    /// Combines the local in-flight flag with the latest `isClaimed` read.
    pub fn derive(in_flight: bool, claimed_on_chain: Option<bool>) -> Self {
        if in_flight {
            Self::InFlight
        } else if claimed_on_chain == Some(true) {
            Self::Claimed
        } else {
            Self::Unclaimed
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Claimed)
    }
}

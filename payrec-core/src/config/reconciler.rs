//! Reconciliation tuning.

use std::time::Duration;

/// Bounds and defaults applied while reconciling deposits and payouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Currency assumed for a payout when the escrow records none.
    pub default_currency: String,
    /// Upper bound for broadcasting one token transfer.
    pub transfer_timeout: Duration,
    /// How long one delivery waits for a broadcast transfer to confirm.
    pub confirm_timeout: Duration,
    /// Upper bound for one payout API call.
    pub payout_timeout: Duration,
    /// Age after which a claim left by a vanished worker may be taken over.
    /// Must exceed both `transfer_timeout` and `payout_timeout`.
    pub claim_lease: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            default_currency: "RWF".to_string(),
            transfer_timeout: Duration::from_secs(180),
            confirm_timeout: Duration::from_secs(180),
            payout_timeout: Duration::from_secs(30),
            claim_lease: Duration::from_secs(900),
        }
    }
}

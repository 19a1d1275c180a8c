//! Reconciliation processors.
//!
//! - `CallbackRouter`: classifies a provider callback and dispatches each event
//! - `DepositReconciler`: handles `DepositCompleted` for purchases and escrows
//! - `PayoutStatusReconciler`: handles `PayoutTerminal`
//! - `PayoutInitiator`: starts the seller payout of a completed fiat escrow
//! - `EscrowWatcher`: receives `EscrowChanged`, drives `PayoutInitiator`

pub mod callback_router;
pub mod deposit_reconciler;
pub mod escrow_watcher;
pub mod guard;
pub mod payout_initiator;
pub mod payout_status;

pub use callback_router::{CallbackOutcome, CallbackRouter};
pub use deposit_reconciler::{DepositOutcome, DepositReconciler};
pub use escrow_watcher::EscrowWatcher;
pub use guard::{SkipReason, Verdict};
pub use payout_initiator::{PayoutInitiator, PayoutOutcome};
pub use payout_status::{PayoutStatusOutcome, PayoutStatusReconciler};

use crate::store::StoreError;

/// Errors that abort handling of one event.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

//! Event type definitions.

use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::{EscrowStatus, PaymentType, PayoutStatus};

/// A fiat deposit reached `COMPLETED`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositCompleted {
    pub deposit_id: String,
    /// Amount reported by the provider, `None` when absent or unparseable.
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
}

/// A payout reached a terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutTerminal {
    pub payout_id: String,
    pub status: PayoutStatus,
}

/// A business event derived from one provider callback.
///
/// A single callback may carry both a deposit and a payout section, in which
/// case both events are produced and handled independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackEvent {
    DepositCompleted(DepositCompleted),
    PayoutTerminal(PayoutTerminal),
}

/// The fields of an escrow that transition detection looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EscrowSnapshot {
    pub status: EscrowStatus,
    pub payment_type: PaymentType,
}

/// Notification published by the store for every escrow write.
///
/// `before` is absent for inserts, `after` for deletes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EscrowChanged {
    pub escrow_id: Uuid,
    pub before: Option<EscrowSnapshot>,
    pub after: Option<EscrowSnapshot>,
}

/// An escrow change that requires action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowTransition {
    /// A fiat escrow moved into `completed`; its seller is due a payout.
    Completed {
        escrow_id: Uuid,
        snapshot: EscrowSnapshot,
    },
}

impl EscrowTransition {
    pub fn escrow_id(&self) -> Uuid {
        match self {
            EscrowTransition::Completed { escrow_id, .. } => *escrow_id,
        }
    }
}

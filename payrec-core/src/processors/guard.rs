//! Idempotence checks run against freshly read state before any side effect.

use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::entities::{Escrow, EscrowStatus, PaymentType, Purchase, PurchaseStatus, claim_is_live};

/// Why an event was dropped without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No entity matches the event.
    NotFound,
    /// More than one entity matches an identifier that must be unique.
    Ambiguous,
    /// The purchase was already completed or failed.
    PurchaseSettled(PurchaseStatus),
    /// Another worker holds a live claim.
    InFlight,
    /// The escrow is not waiting for funds.
    NotFundable(EscrowStatus),
    /// The escrow already has a payout.
    PayoutExists,
    /// The escrow is not a completed fiat escrow.
    NotPayable(EscrowStatus, PaymentType),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "no matching record"),
            SkipReason::Ambiguous => write!(f, "identifier matches more than one record"),
            SkipReason::PurchaseSettled(status) => write!(f, "purchase already {status:?}"),
            SkipReason::InFlight => write!(f, "claimed by another worker"),
            SkipReason::NotFundable(status) => write!(f, "escrow is {status}, not created"),
            SkipReason::PayoutExists => write!(f, "payout already initiated"),
            SkipReason::NotPayable(status, payment_type) => {
                write!(f, "escrow is {status} {payment_type:?}, not completed fiat")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict<T> {
    Proceed(T),
    Skip(SkipReason),
}

/// What a completed deposit still has to do for a pending purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseStep<'a> {
    /// Nothing was broadcast: claim the purchase and send the transfer.
    Transfer,
    /// A transfer was broadcast under `claim_id`: only its confirmation is
    /// outstanding.
    Confirm { tx_hash: &'a str, claim_id: Uuid },
}

/// A completed deposit drives a pending purchase. Nothing broadcast and no
/// live claim means transfer; a recorded broadcast means confirm. Claims
/// taken before `cutoff` count as abandoned.
pub fn purchase_deposit(
    purchase: &Purchase,
    cutoff: PrimitiveDateTime,
) -> Verdict<PurchaseStep<'_>> {
    if purchase.status != PurchaseStatus::Pending {
        return Verdict::Skip(SkipReason::PurchaseSettled(purchase.status));
    }
    match (purchase.tx_hash.as_deref(), purchase.claim_id) {
        (Some(tx_hash), Some(claim_id)) => {
            Verdict::Proceed(PurchaseStep::Confirm { tx_hash, claim_id })
        }
        (Some(_), None) => Verdict::Skip(SkipReason::InFlight),
        (None, Some(_)) if claim_is_live(purchase.claimed_at, cutoff) => {
            Verdict::Skip(SkipReason::InFlight)
        }
        (None, _) => Verdict::Proceed(PurchaseStep::Transfer),
    }
}

/// A completed deposit funds a fiat escrow only if exactly one matches and it
/// is still `created`.
pub fn escrow_deposit(candidates: &[Escrow]) -> Verdict<&Escrow> {
    match unique(candidates) {
        Verdict::Proceed(escrow)
            if escrow.payment_type == PaymentType::Fiat
                && escrow.status == EscrowStatus::Created =>
        {
            Verdict::Proceed(escrow)
        }
        Verdict::Proceed(escrow) => Verdict::Skip(SkipReason::NotFundable(escrow.status)),
        Verdict::Skip(reason) => Verdict::Skip(reason),
    }
}

/// A terminal payout status applies only to the single escrow carrying the payout id.
pub fn payout_status(candidates: &[Escrow]) -> Verdict<&Escrow> {
    unique(candidates)
}

/// A payout may start only for a completed fiat escrow without payout or
/// live claim. Claims taken before `cutoff` count as abandoned.
pub fn escrow_payout(escrow: &Escrow, cutoff: PrimitiveDateTime) -> Verdict<&Escrow> {
    if escrow.payout_id.is_some() {
        Verdict::Skip(SkipReason::PayoutExists)
    } else if claim_is_live(escrow.payout_claimed_at, cutoff) {
        Verdict::Skip(SkipReason::InFlight)
    } else if escrow.status != EscrowStatus::Completed || escrow.payment_type != PaymentType::Fiat
    {
        Verdict::Skip(SkipReason::NotPayable(escrow.status, escrow.payment_type))
    } else {
        Verdict::Proceed(escrow)
    }
}

fn unique(candidates: &[Escrow]) -> Verdict<&Escrow> {
    match candidates {
        [] => Verdict::Skip(SkipReason::NotFound),
        [escrow] => Verdict::Proceed(escrow),
        _ => Verdict::Skip(SkipReason::Ambiguous),
    }
}

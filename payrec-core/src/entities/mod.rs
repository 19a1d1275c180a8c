pub mod escrow;
pub mod purchase;

use payrec_sdk::objects::{
    EscrowStatus as SdkEscrowStatus, PaymentType as SdkPaymentType,
    PayoutStatus as SdkPayoutStatus, PurchaseStatus as SdkPurchaseStatus,
};

pub use escrow::Escrow;
pub use purchase::Purchase;

/// Current UTC wall-clock time in the representation stored by the database.
pub fn utc_now() -> time::PrimitiveDateTime {
    let now = time::OffsetDateTime::now_utc();
    time::PrimitiveDateTime::new(now.date(), now.time())
}

/// Claims taken before the returned instant have outlived `lease` and may be
/// taken over.
pub fn lease_cutoff(lease: std::time::Duration) -> time::PrimitiveDateTime {
    time::Duration::try_from(lease)
        .ok()
        .and_then(|lease| utc_now().checked_sub(lease))
        .unwrap_or(time::PrimitiveDateTime::MIN)
}

/// Whether a claim stamped at `claimed_at` is still held.
pub fn claim_is_live(
    claimed_at: Option<time::PrimitiveDateTime>,
    cutoff: time::PrimitiveDateTime,
) -> bool {
    claimed_at.is_some_and(|claimed_at| claimed_at >= cutoff)
}

/// Purchase status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `payrec_sdk::objects::PurchaseStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "purchase_status")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
}

impl From<PurchaseStatus> for SdkPurchaseStatus {
    fn from(value: PurchaseStatus) -> Self {
        match value {
            PurchaseStatus::Pending => SdkPurchaseStatus::Pending,
            PurchaseStatus::Completed => SdkPurchaseStatus::Completed,
            PurchaseStatus::Failed => SdkPurchaseStatus::Failed,
        }
    }
}

/// Escrow status for database operations.
///
/// Also deserialized from escrow change notifications, which carry the
/// database label as a lowercase string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, serde::Deserialize)]
#[sqlx(rename_all = "lowercase", type_name = "escrow_status")]
#[serde(rename_all = "lowercase")]
pub enum EscrowStatus {
    Created,
    Funded,
    Completed,
    Cancelled,
    Disputed,
    Refunded,
}

impl From<EscrowStatus> for SdkEscrowStatus {
    fn from(value: EscrowStatus) -> Self {
        match value {
            EscrowStatus::Created => SdkEscrowStatus::Created,
            EscrowStatus::Funded => SdkEscrowStatus::Funded,
            EscrowStatus::Completed => SdkEscrowStatus::Completed,
            EscrowStatus::Cancelled => SdkEscrowStatus::Cancelled,
            EscrowStatus::Disputed => SdkEscrowStatus::Disputed,
            EscrowStatus::Refunded => SdkEscrowStatus::Refunded,
        }
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EscrowStatus::Created => "created",
            EscrowStatus::Funded => "funded",
            EscrowStatus::Completed => "completed",
            EscrowStatus::Cancelled => "cancelled",
            EscrowStatus::Disputed => "disputed",
            EscrowStatus::Refunded => "refunded",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, serde::Deserialize)]
#[sqlx(rename_all = "lowercase", type_name = "payment_type")]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Fiat,
    Crypto,
}

impl From<PaymentType> for SdkPaymentType {
    fn from(value: PaymentType) -> Self {
        match value {
            PaymentType::Fiat => SdkPaymentType::Fiat,
            PaymentType::Crypto => SdkPaymentType::Crypto,
        }
    }
}

/// Terminal payout status for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE", type_name = "payout_status")]
pub enum PayoutStatus {
    Completed,
    Failed,
    Rejected,
}

impl From<PayoutStatus> for SdkPayoutStatus {
    fn from(value: PayoutStatus) -> Self {
        match value {
            PayoutStatus::Completed => SdkPayoutStatus::Completed,
            PayoutStatus::Failed => SdkPayoutStatus::Failed,
            PayoutStatus::Rejected => SdkPayoutStatus::Rejected,
        }
    }
}

impl From<SdkPayoutStatus> for PayoutStatus {
    fn from(value: SdkPayoutStatus) -> Self {
        match value {
            SdkPayoutStatus::Completed => PayoutStatus::Completed,
            SdkPayoutStatus::Failed => PayoutStatus::Failed,
            SdkPayoutStatus::Rejected => PayoutStatus::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_claim_liveness_follows_the_lease() {
        let cutoff = lease_cutoff(Duration::from_secs(60));
        assert!(claim_is_live(Some(utc_now()), cutoff));
        assert!(!claim_is_live(
            Some(utc_now() - time::Duration::minutes(2)),
            cutoff
        ));
        assert!(!claim_is_live(None, cutoff));
    }

    #[test]
    fn test_oversized_lease_keeps_every_claim() {
        let cutoff = lease_cutoff(Duration::MAX);
        assert_eq!(cutoff, time::PrimitiveDateTime::MIN);
        assert!(claim_is_live(Some(utc_now()), cutoff));
    }
}

//! Admin API request and response types.

use serde::{Deserialize, Serialize};

use super::payout::PayoutStatus;

/// Header name for admin API authentication (plaintext secret).
pub const ADMIN_AUTH_HEADER: &str = "Payrec-Admin-Authorization";

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Purchase status for API responses.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `payrec-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
}

/// Escrow status for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscrowStatus {
    Created,
    Funded,
    Completed,
    Cancelled,
    Disputed,
    Refunded,
}

/// How the buyer pays into an escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Fiat,
    Crypto,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Full purchase detail for the admin API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub deposit_id: String,
    pub wallet_address: Option<String>,
    pub token: Option<String>,
    pub crypto_amount: Option<rust_decimal::Decimal>,
    pub status: PurchaseStatus,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
    pub created_at: i64,
    pub claimed_at: Option<i64>,
    /// When the transfer was broadcast. Set with `tx_hash` on a pending purchase
    /// whose confirmation is outstanding.
    pub submitted_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub failed_at: Option<i64>,
}

/// Full escrow detail for the admin API, including payout bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowResponse {
    pub escrow_id: String,
    pub payment_type: PaymentType,
    pub status: EscrowStatus,
    pub deposit_id: Option<String>,
    pub amount: Option<rust_decimal::Decimal>,
    pub fiat_currency: Option<String>,
    pub fiat_amount_paid: Option<rust_decimal::Decimal>,
    pub fiat_currency_paid: Option<String>,
    pub seller_phone: Option<String>,
    pub seller_provider: Option<String>,
    pub payout_id: Option<String>,
    pub payout_request_id: Option<String>,
    pub payout_status: Option<PayoutStatus>,
    pub payout_error: Option<String>,
    pub funded_at: Option<i64>,
    pub payout_claimed_at: Option<i64>,
    pub payout_initiated_at: Option<i64>,
    pub payout_attempted_at: Option<i64>,
    pub payout_updated_at: Option<i64>,
}

/// What a manual payout trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutTriggerOutcome {
    /// The payout API accepted the request and the payout id was stored.
    Initiated,
    /// The guard found nothing to do (payout already initiated or in flight,
    /// escrow not completed, or not a fiat escrow).
    Skipped,
    /// Seller details or amount were unusable; recorded as payout error.
    InvalidInput,
    /// The payout API failed; recorded as payout error.
    Failed,
    /// The outcome is unknown (timeout); the claim was released for retry.
    Deferred,
}

/// Response to `POST /admin/escrows/{escrow_id}/payout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutTriggerResponse {
    pub outcome: PayoutTriggerOutcome,
    pub escrow: EscrowResponse,
}

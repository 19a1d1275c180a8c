//! Persistence seam for purchases and escrows.
//!
//! Every mutating operation is a conditional write: it only applies when the
//! row is still in the state the caller expects and reports whether it did.
//! This is what keeps concurrent deliveries of the same event from both
//! calling an external service.

pub mod postgres;

#[cfg(any(test, feature = "testkit"))]
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::escrow::{EscrowFunding, PayoutRelease};
use crate::entities::purchase::PurchaseSettlement;
use crate::entities::{Escrow, PayoutStatus, Purchase};

pub use postgres::{EscrowChangeListener, PgEntityStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn purchase(&self, deposit_id: &str) -> Result<Option<Purchase>, StoreError>;

    /// Claim a pending purchase with no broadcast transfer. A claim older
    /// than `lease` is taken over.
    async fn claim_purchase(
        &self,
        deposit_id: &str,
        claim_id: Uuid,
        lease: Duration,
    ) -> Result<bool, StoreError>;

    /// Store the hash of the transfer broadcast under `claim_id`. The claim is
    /// kept until the purchase settles.
    async fn record_purchase_submission(
        &self,
        deposit_id: &str,
        claim_id: Uuid,
        tx_hash: &str,
    ) -> Result<bool, StoreError>;

    /// Settle a purchase still pending and held under `claim_id`.
    async fn settle_purchase(
        &self,
        deposit_id: &str,
        claim_id: Uuid,
        settlement: PurchaseSettlement,
    ) -> Result<bool, StoreError>;

    /// Drop the claim and leave the purchase pending. Refused once a transfer
    /// was broadcast.
    async fn release_purchase(&self, deposit_id: &str, claim_id: Uuid)
    -> Result<bool, StoreError>;

    async fn escrow(&self, escrow_id: Uuid) -> Result<Option<Escrow>, StoreError>;

    /// Fiat escrows paid by `deposit_id`. At most two rows are returned, enough
    /// to tell a unique match from a duplicate.
    async fn fiat_escrows_by_deposit(&self, deposit_id: &str) -> Result<Vec<Escrow>, StoreError>;

    /// Escrows carrying `payout_id`, at most two.
    async fn escrows_by_payout(&self, payout_id: &str) -> Result<Vec<Escrow>, StoreError>;

    /// Move a created fiat escrow to funded.
    async fn fund_escrow(&self, escrow_id: Uuid, funding: EscrowFunding)
    -> Result<bool, StoreError>;

    /// Claim the payout of a completed fiat escrow, taking over a claim older
    /// than `lease`. Returns the idempotency key to send, which is an earlier
    /// key if one was kept.
    async fn claim_payout(
        &self,
        escrow_id: Uuid,
        request_id: Uuid,
        lease: Duration,
    ) -> Result<Option<Uuid>, StoreError>;

    async fn confirm_payout(
        &self,
        escrow_id: Uuid,
        request_id: Uuid,
        payout_id: &str,
    ) -> Result<bool, StoreError>;

    async fn release_payout(
        &self,
        escrow_id: Uuid,
        request_id: Uuid,
        release: PayoutRelease,
    ) -> Result<bool, StoreError>;

    async fn record_payout_error(&self, escrow_id: Uuid, error: &str) -> Result<bool, StoreError>;

    async fn update_payout_status(
        &self,
        escrow_id: Uuid,
        status: PayoutStatus,
    ) -> Result<bool, StoreError>;
}

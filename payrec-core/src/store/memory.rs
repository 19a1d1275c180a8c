//! In-process [`EntityStore`] with the same conditional-write semantics as
//! the Postgres store, including escrow change notifications.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{EntityStore, StoreError};
use crate::entities::escrow::{EscrowFunding, PayoutRelease, UNIQUE_LOOKUP_LIMIT};
use crate::entities::purchase::PurchaseSettlement;
use crate::entities::{
    Escrow, EscrowStatus, PaymentType, PayoutStatus, Purchase, PurchaseStatus, claim_is_live,
    lease_cutoff, utc_now,
};
use crate::events::{EscrowChanged, EscrowChangedSender, EscrowSnapshot};

#[derive(Debug, Default)]
struct Tables {
    purchases: HashMap<String, Purchase>,
    escrows: HashMap<Uuid, Escrow>,
}

#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    tables: Mutex<Tables>,
    changes: Option<EscrowChangedSender>,
}

fn snapshot(escrow: &Escrow) -> EscrowSnapshot {
    EscrowSnapshot {
        status: escrow.status,
        payment_type: escrow.payment_type,
    }
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a notification for every escrow write, like the database trigger.
    pub fn with_change_notifications(sender: EscrowChangedSender) -> Self {
        Self {
            tables: Mutex::default(),
            changes: Some(sender),
        }
    }

    pub async fn insert_purchase(&self, purchase: Purchase) {
        let mut tables = self.tables.lock().await;
        tables.purchases.insert(purchase.deposit_id.clone(), purchase);
    }

    pub async fn insert_escrow(&self, escrow: Escrow) {
        let change = EscrowChanged {
            escrow_id: escrow.escrow_id,
            before: None,
            after: Some(snapshot(&escrow)),
        };
        self.tables
            .lock()
            .await
            .escrows
            .insert(escrow.escrow_id, escrow);
        self.notify(change).await;
    }

    /// Status change made by another system, such as the marketplace
    /// marking an escrow completed.
    pub async fn set_escrow_status(&self, escrow_id: Uuid, status: EscrowStatus) -> bool {
        self.write_escrow(escrow_id, |escrow| {
            escrow.status = status;
            true
        })
        .await
    }

    /// Apply `update` to an escrow and notify if it reports a write.
    async fn write_escrow<F>(&self, escrow_id: Uuid, update: F) -> bool
    where
        F: FnOnce(&mut Escrow) -> bool,
    {
        let change = {
            let mut tables = self.tables.lock().await;
            let Some(escrow) = tables.escrows.get_mut(&escrow_id) else {
                return false;
            };
            let before = snapshot(escrow);
            if !update(escrow) {
                return false;
            }
            EscrowChanged {
                escrow_id,
                before: Some(before),
                after: Some(snapshot(escrow)),
            }
        };
        self.notify(change).await;
        true
    }

    async fn notify(&self, change: EscrowChanged) {
        if let Some(sender) = &self.changes
            && sender.send(change).await.is_err()
        {
            tracing::debug!("Escrow change receiver dropped");
        }
    }

    async fn write_purchase<F>(&self, deposit_id: &str, update: F) -> bool
    where
        F: FnOnce(&mut Purchase) -> bool,
    {
        let mut tables = self.tables.lock().await;
        tables
            .purchases
            .get_mut(deposit_id)
            .is_some_and(update)
    }

    async fn find_escrows<P>(&self, predicate: P) -> Vec<Escrow>
    where
        P: Fn(&Escrow) -> bool,
    {
        let tables = self.tables.lock().await;
        let mut found: Vec<Escrow> = tables
            .escrows
            .values()
            .filter(|escrow| predicate(escrow))
            .cloned()
            .collect();
        found.sort_by_key(|escrow| escrow.created_at);
        found.truncate(UNIQUE_LOOKUP_LIMIT as usize);
        found
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn purchase(&self, deposit_id: &str) -> Result<Option<Purchase>, StoreError> {
        Ok(self.tables.lock().await.purchases.get(deposit_id).cloned())
    }

    async fn claim_purchase(
        &self,
        deposit_id: &str,
        claim_id: Uuid,
        lease: Duration,
    ) -> Result<bool, StoreError> {
        let cutoff = lease_cutoff(lease);
        Ok(self
            .write_purchase(deposit_id, |purchase| {
                let held =
                    purchase.claim_id.is_some() && claim_is_live(purchase.claimed_at, cutoff);
                if purchase.status != PurchaseStatus::Pending
                    || purchase.tx_hash.is_some()
                    || held
                {
                    return false;
                }
                purchase.claim_id = Some(claim_id);
                purchase.claimed_at = Some(utc_now());
                true
            })
            .await)
    }

    async fn record_purchase_submission(
        &self,
        deposit_id: &str,
        claim_id: Uuid,
        tx_hash: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .write_purchase(deposit_id, |purchase| {
                if purchase.status != PurchaseStatus::Pending
                    || purchase.claim_id != Some(claim_id)
                    || purchase.tx_hash.is_some()
                {
                    return false;
                }
                purchase.tx_hash = Some(tx_hash.to_string());
                purchase.submitted_at = Some(utc_now());
                true
            })
            .await)
    }

    async fn settle_purchase(
        &self,
        deposit_id: &str,
        claim_id: Uuid,
        settlement: PurchaseSettlement,
    ) -> Result<bool, StoreError> {
        Ok(self
            .write_purchase(deposit_id, |purchase| {
                if purchase.status != PurchaseStatus::Pending
                    || purchase.claim_id != Some(claim_id)
                {
                    return false;
                }
                match settlement {
                    PurchaseSettlement::Completed { tx_hash } => {
                        purchase.status = PurchaseStatus::Completed;
                        purchase.tx_hash = Some(tx_hash);
                        purchase.completed_at = Some(utc_now());
                    }
                    PurchaseSettlement::Failed { error } => {
                        purchase.status = PurchaseStatus::Failed;
                        purchase.error = Some(error);
                        purchase.failed_at = Some(utc_now());
                    }
                }
                true
            })
            .await)
    }

    async fn release_purchase(
        &self,
        deposit_id: &str,
        claim_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self
            .write_purchase(deposit_id, |purchase| {
                if purchase.status != PurchaseStatus::Pending
                    || purchase.claim_id != Some(claim_id)
                    || purchase.tx_hash.is_some()
                {
                    return false;
                }
                purchase.claim_id = None;
                purchase.claimed_at = None;
                true
            })
            .await)
    }

    async fn escrow(&self, escrow_id: Uuid) -> Result<Option<Escrow>, StoreError> {
        Ok(self.tables.lock().await.escrows.get(&escrow_id).cloned())
    }

    async fn fiat_escrows_by_deposit(&self, deposit_id: &str) -> Result<Vec<Escrow>, StoreError> {
        Ok(self
            .find_escrows(|escrow| {
                escrow.payment_type == PaymentType::Fiat
                    && escrow.deposit_id.as_deref() == Some(deposit_id)
            })
            .await)
    }

    async fn escrows_by_payout(&self, payout_id: &str) -> Result<Vec<Escrow>, StoreError> {
        Ok(self
            .find_escrows(|escrow| escrow.payout_id.as_deref() == Some(payout_id))
            .await)
    }

    async fn fund_escrow(
        &self,
        escrow_id: Uuid,
        funding: EscrowFunding,
    ) -> Result<bool, StoreError> {
        Ok(self
            .write_escrow(escrow_id, |escrow| {
                if escrow.status != EscrowStatus::Created
                    || escrow.payment_type != PaymentType::Fiat
                {
                    return false;
                }
                escrow.status = EscrowStatus::Funded;
                escrow.funded_at = Some(utc_now());
                escrow.fiat_amount_paid = funding.amount_paid;
                escrow.fiat_currency_paid =
                    funding.currency_paid.or_else(|| escrow.fiat_currency.clone());
                true
            })
            .await)
    }

    async fn claim_payout(
        &self,
        escrow_id: Uuid,
        request_id: Uuid,
        lease: Duration,
    ) -> Result<Option<Uuid>, StoreError> {
        let cutoff = lease_cutoff(lease);
        let mut key = None;
        self.write_escrow(escrow_id, |escrow| {
            if escrow.status != EscrowStatus::Completed
                || escrow.payment_type != PaymentType::Fiat
                || escrow.payout_id.is_some()
                || claim_is_live(escrow.payout_claimed_at, cutoff)
            {
                return false;
            }
            escrow.payout_claimed_at = Some(utc_now());
            let request_id = *escrow.payout_request_id.get_or_insert(request_id);
            key = Some(request_id);
            true
        })
        .await;
        Ok(key)
    }

    async fn confirm_payout(
        &self,
        escrow_id: Uuid,
        request_id: Uuid,
        payout_id: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .write_escrow(escrow_id, |escrow| {
                if escrow.payout_id.is_some() || escrow.payout_request_id != Some(request_id) {
                    return false;
                }
                escrow.payout_id = Some(payout_id.to_string());
                escrow.payout_initiated_at = Some(utc_now());
                escrow.payout_claimed_at = None;
                escrow.payout_error = None;
                true
            })
            .await)
    }

    async fn release_payout(
        &self,
        escrow_id: Uuid,
        request_id: Uuid,
        release: PayoutRelease,
    ) -> Result<bool, StoreError> {
        Ok(self
            .write_escrow(escrow_id, |escrow| {
                if escrow.payout_id.is_some() || escrow.payout_request_id != Some(request_id) {
                    return false;
                }
                escrow.payout_claimed_at = None;
                if let Some(error) = release.error {
                    escrow.payout_error = Some(error);
                    escrow.payout_attempted_at = Some(utc_now());
                }
                if release.forget_request {
                    escrow.payout_request_id = None;
                }
                true
            })
            .await)
    }

    async fn record_payout_error(&self, escrow_id: Uuid, error: &str) -> Result<bool, StoreError> {
        Ok(self
            .write_escrow(escrow_id, |escrow| {
                if escrow.payout_id.is_some() {
                    return false;
                }
                escrow.payout_error = Some(error.to_string());
                escrow.payout_attempted_at = Some(utc_now());
                true
            })
            .await)
    }

    async fn update_payout_status(
        &self,
        escrow_id: Uuid,
        status: PayoutStatus,
    ) -> Result<bool, StoreError> {
        Ok(self
            .write_escrow(escrow_id, |escrow| {
                escrow.payout_status = Some(status);
                escrow.payout_updated_at = Some(utc_now());
                true
            })
            .await)
    }
}

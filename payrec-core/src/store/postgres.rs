use std::time::Duration;

use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::watch;
use uuid::Uuid;

use super::{EntityStore, StoreError};
use crate::entities::escrow::{
    ClaimEscrowPayout, ConfirmEscrowPayout, EscrowFunding, FundEscrow, GetEscrowById,
    GetEscrowsByPayoutId, GetFiatEscrowsByDepositId, PayoutRelease, RecordEscrowPayoutError,
    ReleaseEscrowPayout, UpdateEscrowPayoutStatus,
};
use crate::entities::purchase::{
    ClaimPurchase, GetPurchaseByDepositId, PurchaseSettlement, RecordPurchaseSubmission,
    ReleasePurchaseClaim, SettlePurchase,
};
use crate::entities::{Escrow, PayoutStatus, Purchase};
use crate::events::{EscrowChanged, EscrowChangedSender};
use crate::framework::DatabaseProcessor;

/// Postgres channel the escrow trigger publishes on.
pub const ESCROW_CHANGED_CHANNEL: &str = "escrow_changed";

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct PgEntityStore {
    db: DatabaseProcessor,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            db: DatabaseProcessor { pool },
        }
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn purchase(&self, deposit_id: &str) -> Result<Option<Purchase>, StoreError> {
        let query = GetPurchaseByDepositId {
            deposit_id: deposit_id.to_string(),
        };
        Ok(self.db.process(query).await?)
    }

    async fn claim_purchase(
        &self,
        deposit_id: &str,
        claim_id: Uuid,
        lease: Duration,
    ) -> Result<bool, StoreError> {
        let claim = ClaimPurchase {
            deposit_id: deposit_id.to_string(),
            claim_id,
            lease,
        };
        Ok(self.db.process(claim).await?)
    }

    async fn record_purchase_submission(
        &self,
        deposit_id: &str,
        claim_id: Uuid,
        tx_hash: &str,
    ) -> Result<bool, StoreError> {
        let record = RecordPurchaseSubmission {
            deposit_id: deposit_id.to_string(),
            claim_id,
            tx_hash: tx_hash.to_string(),
        };
        Ok(self.db.process(record).await?)
    }

    async fn settle_purchase(
        &self,
        deposit_id: &str,
        claim_id: Uuid,
        settlement: PurchaseSettlement,
    ) -> Result<bool, StoreError> {
        let settle = SettlePurchase {
            deposit_id: deposit_id.to_string(),
            claim_id,
            settlement,
        };
        Ok(self.db.process(settle).await?)
    }

    async fn release_purchase(
        &self,
        deposit_id: &str,
        claim_id: Uuid,
    ) -> Result<bool, StoreError> {
        let release = ReleasePurchaseClaim {
            deposit_id: deposit_id.to_string(),
            claim_id,
        };
        Ok(self.db.process(release).await?)
    }

    async fn escrow(&self, escrow_id: Uuid) -> Result<Option<Escrow>, StoreError> {
        Ok(self.db.process(GetEscrowById { escrow_id }).await?)
    }

    async fn fiat_escrows_by_deposit(&self, deposit_id: &str) -> Result<Vec<Escrow>, StoreError> {
        let query = GetFiatEscrowsByDepositId {
            deposit_id: deposit_id.to_string(),
        };
        Ok(self.db.process(query).await?)
    }

    async fn escrows_by_payout(&self, payout_id: &str) -> Result<Vec<Escrow>, StoreError> {
        let query = GetEscrowsByPayoutId {
            payout_id: payout_id.to_string(),
        };
        Ok(self.db.process(query).await?)
    }

    async fn fund_escrow(
        &self,
        escrow_id: Uuid,
        funding: EscrowFunding,
    ) -> Result<bool, StoreError> {
        Ok(self.db.process(FundEscrow { escrow_id, funding }).await?)
    }

    async fn claim_payout(
        &self,
        escrow_id: Uuid,
        request_id: Uuid,
        lease: Duration,
    ) -> Result<Option<Uuid>, StoreError> {
        let claim = ClaimEscrowPayout {
            escrow_id,
            request_id,
            lease,
        };
        Ok(self.db.process(claim).await?)
    }

    async fn confirm_payout(
        &self,
        escrow_id: Uuid,
        request_id: Uuid,
        payout_id: &str,
    ) -> Result<bool, StoreError> {
        let confirm = ConfirmEscrowPayout {
            escrow_id,
            request_id,
            payout_id: payout_id.to_string(),
        };
        Ok(self.db.process(confirm).await?)
    }

    async fn release_payout(
        &self,
        escrow_id: Uuid,
        request_id: Uuid,
        release: PayoutRelease,
    ) -> Result<bool, StoreError> {
        let release = ReleaseEscrowPayout {
            escrow_id,
            request_id,
            release,
        };
        Ok(self.db.process(release).await?)
    }

    async fn record_payout_error(&self, escrow_id: Uuid, error: &str) -> Result<bool, StoreError> {
        let record = RecordEscrowPayoutError {
            escrow_id,
            error: error.to_string(),
        };
        Ok(self.db.process(record).await?)
    }

    async fn update_payout_status(
        &self,
        escrow_id: Uuid,
        status: PayoutStatus,
    ) -> Result<bool, StoreError> {
        let update = UpdateEscrowPayoutStatus { escrow_id, status };
        Ok(self.db.process(update).await?)
    }
}

/// Forwards `escrow_changed` notifications into the event pipeline.
///
/// Notifications published while the listener is disconnected are lost;
/// completed escrows missed that way are picked up through the admin
/// payout trigger.
pub struct EscrowChangeListener {
    pool: PgPool,
    sender: EscrowChangedSender,
    shutdown_rx: watch::Receiver<bool>,
}

impl EscrowChangeListener {
    pub fn new(
        pool: PgPool,
        sender: EscrowChangedSender,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            pool,
            sender,
            shutdown_rx,
        }
    }

    /// Run until shutdown, reconnecting after connection errors.
    pub async fn run(mut self) {
        tracing::info!(channel = ESCROW_CHANGED_CHANNEL, "EscrowChangeListener started");

        'connect: loop {
            let mut listener = match self.connect().await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for escrow changes");
                    tokio::select! {
                        _ = self.shutdown_rx.changed() => break 'connect,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => continue 'connect,
                    }
                }
            };

            loop {
                tokio::select! {
                    biased;

                    changed = self.shutdown_rx.changed() => {
                        if changed.is_err() || *self.shutdown_rx.borrow() {
                            break 'connect;
                        }
                    }

                    received = listener.recv() => {
                        let notification = match received {
                            Ok(notification) => notification,
                            Err(e) => {
                                tracing::warn!(error = %e, "Escrow change listener connection lost");
                                continue 'connect;
                            }
                        };
                        let change: EscrowChanged = match serde_json::from_str(notification.payload()) {
                            Ok(change) => change,
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    payload = notification.payload(),
                                    "Ignoring malformed escrow change notification"
                                );
                                continue;
                            }
                        };
                        if self.sender.send(change).await.is_err() {
                            tracing::warn!("Escrow change receiver dropped");
                            break 'connect;
                        }
                    }
                }
            }
        }

        tracing::info!("EscrowChangeListener stopped");
    }

    async fn connect(&self) -> Result<PgListener, sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(ESCROW_CHANGED_CHANNEL).await?;
        Ok(listener)
    }
}

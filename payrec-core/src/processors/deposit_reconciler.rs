//! DepositReconciler processor.
//!
//! A completed deposit belongs either to a purchase or to a fiat escrow,
//! never both: once a purchase exists for the deposit id the escrow path is
//! not consulted, whatever the purchase status.

use std::sync::Arc;
use std::time::Duration;

use kanau::processor::Processor;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::ReconcileError;
use super::guard::{self, PurchaseStep, SkipReason, Verdict};
use crate::config::ReconcilerConfig;
use crate::entities::escrow::EscrowFunding;
use crate::entities::purchase::PurchaseSettlement;
use crate::entities::{Purchase, lease_cutoff};
use crate::events::DepositCompleted;
use crate::store::EntityStore;
use crate::transfer::{TokenTransfer, TransferOrder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositOutcome {
    PurchaseCompleted { tx_hash: String },
    PurchaseFailed { error: String },
    /// The broadcast timed out; the claim was released and a redelivery retries it.
    PurchaseDeferred,
    /// The transfer was broadcast but is not confirmed yet. The claim is kept
    /// and a redelivery only waits for the confirmation.
    PurchaseSubmitted { tx_hash: String },
    EscrowFunded { escrow_id: Uuid },
    Skipped(SkipReason),
}

pub struct DepositReconciler {
    store: Arc<dyn EntityStore>,
    transfer: Arc<dyn TokenTransfer>,
    transfer_timeout: Duration,
    confirm_timeout: Duration,
    claim_lease: Duration,
}

impl DepositReconciler {
    pub fn new(
        store: Arc<dyn EntityStore>,
        transfer: Arc<dyn TokenTransfer>,
        config: &ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            transfer,
            transfer_timeout: config.transfer_timeout,
            confirm_timeout: config.confirm_timeout,
            claim_lease: config.claim_lease,
        }
    }

    async fn reconcile_purchase(
        &self,
        purchase: &Purchase,
    ) -> Result<DepositOutcome, ReconcileError> {
        let deposit_id = purchase.deposit_id.as_str();
        match guard::purchase_deposit(purchase, lease_cutoff(self.claim_lease)) {
            Verdict::Skip(reason) => {
                debug!(deposit_id, %reason, "Skipping purchase");
                Ok(DepositOutcome::Skipped(reason))
            }
            Verdict::Proceed(PurchaseStep::Confirm { tx_hash, claim_id }) => {
                info!(deposit_id, tx_hash, "Resuming confirmation of broadcast transfer");
                self.confirm(deposit_id, claim_id, tx_hash).await
            }
            Verdict::Proceed(PurchaseStep::Transfer) => self.transfer(purchase).await,
        }
    }

    async fn transfer(&self, purchase: &Purchase) -> Result<DepositOutcome, ReconcileError> {
        let deposit_id = purchase.deposit_id.as_str();
        if let Some(abandoned) = purchase.claim_id {
            warn!(
                deposit_id,
                %abandoned,
                claimed_at = ?purchase.claimed_at,
                "Taking over an expired purchase claim"
            );
        }

        let claim_id = Uuid::new_v4();
        if !self
            .store
            .claim_purchase(deposit_id, claim_id, self.claim_lease)
            .await?
        {
            debug!(deposit_id, "Purchase claimed concurrently");
            return Ok(DepositOutcome::Skipped(SkipReason::InFlight));
        }

        let order = match transfer_order(purchase) {
            Ok(order) => order,
            Err(error) => {
                warn!(deposit_id, %error, "Purchase cannot be fulfilled");
                return self.settle(deposit_id, claim_id, Err(error)).await;
            }
        };

        let tx_hash =
            match tokio::time::timeout(self.transfer_timeout, self.transfer.submit(&order)).await {
                Ok(Ok(tx_hash)) => tx_hash,
                Ok(Err(e)) => {
                    warn!(deposit_id, error = %e, "Token transfer failed");
                    return self.settle(deposit_id, claim_id, Err(e.to_string())).await;
                }
                Err(_) => {
                    warn!(
                        deposit_id,
                        timeout_secs = self.transfer_timeout.as_secs(),
                        "Token transfer broadcast timed out, releasing claim"
                    );
                    if !self.store.release_purchase(deposit_id, claim_id).await? {
                        warn!(deposit_id, "Purchase claim was lost before release");
                    }
                    return Ok(DepositOutcome::PurchaseDeferred);
                }
            };

        if !self
            .store
            .record_purchase_submission(deposit_id, claim_id, &tx_hash)
            .await?
        {
            error!(
                deposit_id,
                tx_hash = %tx_hash,
                "Transfer broadcast after the purchase claim was lost, needs review"
            );
            return Ok(DepositOutcome::PurchaseSubmitted { tx_hash });
        }
        info!(deposit_id, tx_hash = %tx_hash, "Token transfer broadcast");
        self.confirm(deposit_id, claim_id, &tx_hash).await
    }

    /// Wait for a recorded broadcast. Only a final answer settles the
    /// purchase; anything else keeps the claim so nothing is sent again.
    async fn confirm(
        &self,
        deposit_id: &str,
        claim_id: Uuid,
        tx_hash: &str,
    ) -> Result<DepositOutcome, ReconcileError> {
        match tokio::time::timeout(self.confirm_timeout, self.transfer.confirm(tx_hash)).await {
            Ok(Ok(confirmed)) => {
                info!(deposit_id, tx_hash = %confirmed, "Purchase fulfilled");
                self.settle(deposit_id, claim_id, Ok(confirmed)).await
            }
            Ok(Err(e)) if !e.is_pending() => {
                warn!(deposit_id, error = %e, "Token transfer failed on chain");
                self.settle(deposit_id, claim_id, Err(e.to_string())).await
            }
            Ok(Err(e)) => {
                warn!(
                    deposit_id,
                    tx_hash,
                    error = %e,
                    "Transfer not confirmed yet, keeping claim"
                );
                Ok(DepositOutcome::PurchaseSubmitted {
                    tx_hash: tx_hash.to_string(),
                })
            }
            Err(_) => {
                warn!(
                    deposit_id,
                    tx_hash,
                    timeout_secs = self.confirm_timeout.as_secs(),
                    "Transfer confirmation timed out, keeping claim"
                );
                Ok(DepositOutcome::PurchaseSubmitted {
                    tx_hash: tx_hash.to_string(),
                })
            }
        }
    }

    async fn settle(
        &self,
        deposit_id: &str,
        claim_id: Uuid,
        result: Result<String, String>,
    ) -> Result<DepositOutcome, ReconcileError> {
        let (settlement, outcome) = match result {
            Ok(tx_hash) => (
                PurchaseSettlement::Completed {
                    tx_hash: tx_hash.clone(),
                },
                DepositOutcome::PurchaseCompleted { tx_hash },
            ),
            Err(error) => (
                PurchaseSettlement::Failed {
                    error: error.clone(),
                },
                DepositOutcome::PurchaseFailed { error },
            ),
        };
        if !self
            .store
            .settle_purchase(deposit_id, claim_id, settlement)
            .await?
        {
            warn!(deposit_id, ?outcome, "Purchase claim was lost before settlement");
        }
        Ok(outcome)
    }

    async fn reconcile_escrow(
        &self,
        event: DepositCompleted,
    ) -> Result<DepositOutcome, ReconcileError> {
        let deposit_id = event.deposit_id.as_str();
        let candidates = self.store.fiat_escrows_by_deposit(deposit_id).await?;
        let escrow = match guard::escrow_deposit(&candidates) {
            Verdict::Proceed(escrow) => escrow,
            Verdict::Skip(reason) => {
                debug!(deposit_id, %reason, "Deposit does not fund an escrow");
                return Ok(DepositOutcome::Skipped(reason));
            }
        };

        let funding = EscrowFunding {
            amount_paid: event.amount,
            currency_paid: event.currency.clone().or_else(|| escrow.fiat_currency.clone()),
        };
        if !self.store.fund_escrow(escrow.escrow_id, funding).await? {
            debug!(deposit_id, escrow_id = %escrow.escrow_id, "Escrow changed concurrently");
            return Ok(DepositOutcome::Skipped(SkipReason::NotFundable(escrow.status)));
        }

        info!(
            deposit_id,
            escrow_id = %escrow.escrow_id,
            amount = ?event.amount,
            currency = ?event.currency,
            "Escrow funded"
        );
        Ok(DepositOutcome::EscrowFunded {
            escrow_id: escrow.escrow_id,
        })
    }
}

impl Processor<DepositCompleted> for DepositReconciler {
    type Output = DepositOutcome;
    type Error = ReconcileError;

    #[tracing::instrument(skip_all, err, fields(deposit_id = %event.deposit_id))]
    async fn process(&self, event: DepositCompleted) -> Result<DepositOutcome, ReconcileError> {
        match self.store.purchase(&event.deposit_id).await? {
            Some(purchase) => self.reconcile_purchase(&purchase).await,
            None => self.reconcile_escrow(event).await,
        }
    }
}

/// Validate the purchase fields needed for a transfer.
fn transfer_order(purchase: &Purchase) -> Result<TransferOrder, String> {
    let wallet = purchase
        .wallet_address
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let token = purchase
        .token
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let mut missing = Vec::new();
    if wallet.is_none() {
        missing.push("walletAddress");
    }
    if token.is_none() {
        missing.push("token");
    }
    if purchase.crypto_amount.is_none() {
        missing.push("cryptoAmount");
    }
    if !missing.is_empty() {
        return Err(format!("missing required fields: {}", missing.join(", ")));
    }

    match (wallet, token, purchase.crypto_amount) {
        (Some(wallet), Some(token), Some(amount)) if amount > Decimal::ZERO => Ok(TransferOrder {
            to_address: wallet.to_string(),
            token: token.to_string(),
            amount,
        }),
        (_, _, amount) => Err(format!(
            "cryptoAmount must be positive, got {}",
            amount.unwrap_or_default()
        )),
    }
}

//! PayoutInitiator processor.
//!
//! Sends the seller payout for a completed fiat escrow. The escrow is re-read
//! before acting and the payout claim is taken with a conditional write, so
//! however many notifications or manual triggers race, at most one payout
//! request is in flight per escrow. The idempotency key survives attempts
//! whose outcome is unknown, which lets the provider drop a retried duplicate.

use std::sync::Arc;
use std::time::Duration;

use kanau::processor::Processor;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::ReconcileError;
use super::guard::{self, SkipReason, Verdict};
use crate::config::ReconcilerConfig;
use crate::entities::escrow::PayoutRelease;
use crate::entities::{Escrow, lease_cutoff};
use crate::events::EscrowTransition;
use crate::payout::{PayoutApi, PayoutCommand, digits_only, whole_units};
use crate::store::EntityStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutOutcome {
    Initiated { payout_id: String },
    Skipped(SkipReason),
    /// Seller details or amount unusable; recorded as the payout error.
    InvalidInput { error: String },
    /// The provider refused or the call failed; recorded as the payout error.
    Failed { error: String },
    /// Timed out with unknown outcome; the claim was released for a retry.
    Deferred,
}

pub struct PayoutInitiator {
    store: Arc<dyn EntityStore>,
    payout: Arc<dyn PayoutApi>,
    default_currency: String,
    payout_timeout: Duration,
    claim_lease: Duration,
}

impl PayoutInitiator {
    pub fn new(
        store: Arc<dyn EntityStore>,
        payout: Arc<dyn PayoutApi>,
        config: &ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            payout,
            default_currency: config.default_currency.clone(),
            payout_timeout: config.payout_timeout,
            claim_lease: config.claim_lease,
        }
    }

    /// Attempt the payout of one escrow.
    ///
    /// Used both for detected completions and for manual retries.
    #[tracing::instrument(skip(self), err)]
    pub async fn initiate(&self, escrow_id: Uuid) -> Result<PayoutOutcome, ReconcileError> {
        let Some(escrow) = self.store.escrow(escrow_id).await? else {
            debug!("Escrow disappeared before payout");
            return Ok(PayoutOutcome::Skipped(SkipReason::NotFound));
        };
        if let Verdict::Skip(reason) = guard::escrow_payout(&escrow, lease_cutoff(self.claim_lease))
        {
            debug!(%reason, "Skipping payout");
            return Ok(PayoutOutcome::Skipped(reason));
        }
        if let Some(claimed_at) = escrow.payout_claimed_at {
            warn!(?claimed_at, "Taking over an expired payout claim");
        }

        let terms = match PayoutTerms::resolve(&escrow, &self.default_currency) {
            Ok(terms) => terms,
            Err(error) => {
                error!(%error, "Escrow cannot be paid out");
                self.store.record_payout_error(escrow_id, &error).await?;
                return Ok(PayoutOutcome::InvalidInput { error });
            }
        };

        let Some(request_id) = self
            .store
            .claim_payout(escrow_id, Uuid::new_v4(), self.claim_lease)
            .await?
        else {
            debug!("Payout claimed concurrently");
            return Ok(PayoutOutcome::Skipped(SkipReason::InFlight));
        };

        let command = PayoutCommand {
            request_id,
            phone_number: terms.phone_number,
            provider: terms.provider,
            amount: terms.amount,
            currency: terms.currency,
            client_reference_id: escrow_id.to_string(),
        };
        info!(
            %request_id,
            amount = %command.amount,
            currency = %command.currency,
            provider = %command.provider,
            "Initiating seller payout"
        );

        match tokio::time::timeout(self.payout_timeout, self.payout.initiate(&command)).await {
            Ok(Ok(receipt)) => {
                let payout_id = receipt
                    .payout_id
                    .filter(|id| !id.trim().is_empty())
                    .unwrap_or_else(|| request_id.to_string());
                if !self
                    .store
                    .confirm_payout(escrow_id, request_id, &payout_id)
                    .await?
                {
                    warn!(%payout_id, "Payout claim was lost before confirmation");
                }
                info!(%payout_id, duplicate = receipt.duplicate, "Seller payout initiated");
                Ok(PayoutOutcome::Initiated { payout_id })
            }
            Ok(Err(e)) => {
                let ambiguous = e.is_ambiguous();
                let error = e.to_string();
                warn!(%error, ambiguous, "Seller payout failed");
                let release = PayoutRelease {
                    error: Some(error.clone()),
                    forget_request: !ambiguous,
                };
                self.release(escrow_id, request_id, release).await?;
                Ok(PayoutOutcome::Failed { error })
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.payout_timeout.as_secs(),
                    "Payout request timed out, releasing claim"
                );
                self.release(escrow_id, request_id, PayoutRelease::default())
                    .await?;
                Ok(PayoutOutcome::Deferred)
            }
        }
    }

    async fn release(
        &self,
        escrow_id: Uuid,
        request_id: Uuid,
        release: PayoutRelease,
    ) -> Result<(), ReconcileError> {
        if !self
            .store
            .release_payout(escrow_id, request_id, release)
            .await?
        {
            warn!(%escrow_id, "Payout claim was lost before release");
        }
        Ok(())
    }
}

impl Processor<EscrowTransition> for PayoutInitiator {
    type Output = PayoutOutcome;
    type Error = ReconcileError;

    async fn process(&self, transition: EscrowTransition) -> Result<PayoutOutcome, ReconcileError> {
        self.initiate(transition.escrow_id()).await
    }
}

/// Payout parameters resolved from an escrow.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PayoutTerms {
    phone_number: String,
    provider: String,
    amount: String,
    currency: String,
}

impl PayoutTerms {
    /// The paid amount and currency take precedence over the nominal ones.
    fn resolve(escrow: &Escrow, default_currency: &str) -> Result<Self, String> {
        let phone_number = escrow
            .seller_phone
            .as_deref()
            .map(digits_only)
            .unwrap_or_default();
        let provider = escrow
            .seller_provider
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        let amount = escrow
            .fiat_amount_paid
            .or(escrow.amount)
            .map(whole_units)
            .unwrap_or_default();
        let currency = [&escrow.fiat_currency_paid, &escrow.fiat_currency]
            .into_iter()
            .flatten()
            .map(|c| c.trim())
            .find(|c| !c.is_empty())
            .unwrap_or(default_currency)
            .to_string();

        let mut problems = Vec::new();
        if phone_number.is_empty() {
            problems.push("seller phone is missing");
        }
        if provider.is_empty() {
            problems.push("seller provider is missing");
        }
        if amount <= Decimal::ZERO {
            problems.push("payout amount is not positive");
        }
        if !problems.is_empty() {
            return Err(problems.join("; "));
        }

        Ok(Self {
            phone_number,
            provider,
            amount: amount.to_string(),
            currency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EscrowStatus;
    use crate::store::memory::MemoryEntityStore;
    use crate::testkit::{PayoutBehavior, RecordingPayoutApi, fiat_escrow};

    fn initiator(
        store: &Arc<MemoryEntityStore>,
        payout: &Arc<RecordingPayoutApi>,
    ) -> PayoutInitiator {
        let config = ReconcilerConfig {
            payout_timeout: Duration::from_millis(200),
            ..ReconcilerConfig::default()
        };
        PayoutInitiator::new(store.clone(), payout.clone(), &config)
    }

    async fn completed_escrow(store: &MemoryEntityStore) -> Uuid {
        let mut escrow = fiat_escrow("d1", EscrowStatus::Completed);
        escrow.fiat_amount_paid = Some(Decimal::new(100005, 1));
        escrow.fiat_currency_paid = Some("RWF".to_string());
        let escrow_id = escrow.escrow_id;
        store.insert_escrow(escrow).await;
        escrow_id
    }

    #[tokio::test]
    async fn test_payout_is_initiated() {
        let store = Arc::new(MemoryEntityStore::new());
        let escrow_id = completed_escrow(&store).await;
        let payout = Arc::new(RecordingPayoutApi::new(PayoutBehavior::Accept {
            payout_id: Some("p1".to_string()),
        }));
        let initiator = initiator(&store, &payout);

        let outcome = initiator.initiate(escrow_id).await.unwrap();
        assert_eq!(
            outcome,
            PayoutOutcome::Initiated {
                payout_id: "p1".to_string()
            }
        );

        let commands = payout.commands().await;
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].phone_number, "250788123456");
        assert_eq!(commands[0].provider, "MTN_MOMO_RWA");
        assert_eq!(commands[0].amount, "10001");
        assert_eq!(commands[0].currency, "RWF");
        assert_eq!(commands[0].client_reference_id, escrow_id.to_string());

        let escrow = store.escrow(escrow_id).await.unwrap().unwrap();
        assert_eq!(escrow.payout_id.as_deref(), Some("p1"));
        assert!(escrow.payout_initiated_at.is_some());
        assert!(escrow.payout_claimed_at.is_none());
        assert_eq!(escrow.payout_request_id, Some(commands[0].request_id));
    }

    #[tokio::test]
    async fn test_missing_provider_payout_id_falls_back_to_request_id() {
        let store = Arc::new(MemoryEntityStore::new());
        let escrow_id = completed_escrow(&store).await;
        let payout = Arc::new(RecordingPayoutApi::new(PayoutBehavior::Accept {
            payout_id: None,
        }));
        let initiator = initiator(&store, &payout);

        initiator.initiate(escrow_id).await.unwrap();
        let request_id = payout.commands().await[0].request_id;
        let escrow = store.escrow(escrow_id).await.unwrap().unwrap();
        assert_eq!(escrow.payout_id, Some(request_id.to_string()));
    }

    #[tokio::test]
    async fn test_second_trigger_is_skipped() {
        let store = Arc::new(MemoryEntityStore::new());
        let escrow_id = completed_escrow(&store).await;
        let payout = Arc::new(RecordingPayoutApi::new(PayoutBehavior::Accept {
            payout_id: Some("p1".to_string()),
        }));
        let initiator = initiator(&store, &payout);

        initiator.initiate(escrow_id).await.unwrap();
        let again = initiator.initiate(escrow_id).await.unwrap();
        assert_eq!(again, PayoutOutcome::Skipped(SkipReason::PayoutExists));
        assert_eq!(payout.commands().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_triggers_pay_once() {
        let store = Arc::new(MemoryEntityStore::new());
        let escrow_id = completed_escrow(&store).await;
        let payout = Arc::new(
            RecordingPayoutApi::new(PayoutBehavior::Accept {
                payout_id: Some("p1".to_string()),
            })
            .with_delay(Duration::from_millis(20)),
        );
        let initiator = Arc::new(initiator(&store, &payout));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let initiator = initiator.clone();
                tokio::spawn(async move { initiator.initiate(escrow_id).await })
            })
            .collect();
        let mut initiated = 0;
        for handle in handles {
            if let PayoutOutcome::Initiated { .. } = handle.await.unwrap().unwrap() {
                initiated += 1;
            }
        }

        assert_eq!(initiated, 1);
        assert_eq!(payout.commands().await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_seller_details_are_recorded() {
        let store = Arc::new(MemoryEntityStore::new());
        let mut escrow = fiat_escrow("d1", EscrowStatus::Completed);
        escrow.seller_phone = Some("n/a".to_string());
        escrow.seller_provider = None;
        let escrow_id = escrow.escrow_id;
        store.insert_escrow(escrow).await;
        let payout = Arc::new(RecordingPayoutApi::new(PayoutBehavior::Accept {
            payout_id: Some("p1".to_string()),
        }));
        let initiator = initiator(&store, &payout);

        let outcome = initiator.initiate(escrow_id).await.unwrap();
        assert_eq!(
            outcome,
            PayoutOutcome::InvalidInput {
                error: "seller phone is missing; seller provider is missing".to_string()
            }
        );
        assert!(payout.commands().await.is_empty());

        let escrow = store.escrow(escrow_id).await.unwrap().unwrap();
        assert!(escrow.payout_error.is_some());
        assert!(escrow.payout_attempted_at.is_some());
        assert!(escrow.payout_id.is_none());
    }

    #[tokio::test]
    async fn test_nominal_amount_and_default_currency_are_used() {
        let store = Arc::new(MemoryEntityStore::new());
        let mut escrow = fiat_escrow("d1", EscrowStatus::Completed);
        escrow.amount = Some(Decimal::from(5000));
        escrow.fiat_amount_paid = None;
        escrow.fiat_currency = None;
        escrow.fiat_currency_paid = None;
        let escrow_id = escrow.escrow_id;
        store.insert_escrow(escrow).await;
        let payout = Arc::new(RecordingPayoutApi::new(PayoutBehavior::Accept {
            payout_id: Some("p1".to_string()),
        }));
        let initiator = initiator(&store, &payout);

        initiator.initiate(escrow_id).await.unwrap();
        let commands = payout.commands().await;
        assert_eq!(commands[0].amount, "5000");
        assert_eq!(commands[0].currency, "RWF");
    }

    async fn payout_currency(paid: Option<&str>, nominal: Option<&str>) -> String {
        let store = Arc::new(MemoryEntityStore::new());
        let mut escrow = fiat_escrow("d1", EscrowStatus::Completed);
        escrow.fiat_currency_paid = paid.map(str::to_string);
        escrow.fiat_currency = nominal.map(str::to_string);
        let escrow_id = escrow.escrow_id;
        store.insert_escrow(escrow).await;
        let payout = Arc::new(RecordingPayoutApi::new(PayoutBehavior::Accept {
            payout_id: Some("p1".to_string()),
        }));

        initiator(&store, &payout).initiate(escrow_id).await.unwrap();
        payout.commands().await[0].currency.clone()
    }

    #[tokio::test]
    async fn test_nominal_currency_applies_when_paid_currency_is_missing() {
        assert_eq!(payout_currency(None, Some("KES")).await, "KES");
        assert_eq!(payout_currency(Some("  "), Some("KES")).await, "KES");
    }

    #[tokio::test]
    async fn test_paid_currency_wins_over_nominal_currency() {
        assert_eq!(payout_currency(Some("UGX"), Some("KES")).await, "UGX");
    }

    #[tokio::test]
    async fn test_abandoned_payout_claim_is_taken_over_after_lease() {
        let store = Arc::new(MemoryEntityStore::new());
        let escrow_id = completed_escrow(&store).await;
        let payout = Arc::new(RecordingPayoutApi::new(PayoutBehavior::Accept {
            payout_id: Some("p1".to_string()),
        }));
        let lease = Duration::from_millis(300);
        let initiator = PayoutInitiator::new(
            store.clone(),
            payout.clone(),
            &ReconcilerConfig {
                payout_timeout: Duration::from_millis(200),
                claim_lease: lease,
                ..ReconcilerConfig::default()
            },
        );

        // A worker claims the payout and dies before calling the provider.
        let abandoned_key = store
            .claim_payout(escrow_id, Uuid::new_v4(), lease)
            .await
            .unwrap();
        assert!(abandoned_key.is_some());

        let blocked = initiator.initiate(escrow_id).await.unwrap();
        assert_eq!(blocked, PayoutOutcome::Skipped(SkipReason::InFlight));
        assert!(payout.commands().await.is_empty());

        tokio::time::sleep(lease + Duration::from_millis(50)).await;
        let outcome = initiator.initiate(escrow_id).await.unwrap();
        assert_eq!(
            outcome,
            PayoutOutcome::Initiated {
                payout_id: "p1".to_string()
            }
        );
        let commands = payout.commands().await;
        assert_eq!(commands.len(), 1);
        // The abandoned attempt's key is reused so the provider can collapse it.
        assert_eq!(Some(commands[0].request_id), abandoned_key);
    }

    #[tokio::test]
    async fn test_rejection_records_error_and_forgets_key() {
        let store = Arc::new(MemoryEntityStore::new());
        let escrow_id = completed_escrow(&store).await;
        let payout = Arc::new(RecordingPayoutApi::new(PayoutBehavior::Reject(
            "PAYOUTS_NOT_ALLOWED".to_string(),
        )));
        let initiator = initiator(&store, &payout);

        let outcome = initiator.initiate(escrow_id).await.unwrap();
        assert!(matches!(outcome, PayoutOutcome::Failed { .. }));

        let escrow = store.escrow(escrow_id).await.unwrap().unwrap();
        assert!(escrow.payout_id.is_none());
        assert!(escrow.payout_claimed_at.is_none());
        assert!(escrow.payout_request_id.is_none());
        assert!(escrow.payout_error.unwrap().contains("PAYOUTS_NOT_ALLOWED"));
        assert!(escrow.payout_attempted_at.is_some());
    }

    #[tokio::test]
    async fn test_ambiguous_failure_keeps_key_for_retry() {
        let store = Arc::new(MemoryEntityStore::new());
        let escrow_id = completed_escrow(&store).await;
        let payout = Arc::new(RecordingPayoutApi::new(PayoutBehavior::Ambiguous));
        let initiator = initiator(&store, &payout);

        let outcome = initiator.initiate(escrow_id).await.unwrap();
        assert!(matches!(outcome, PayoutOutcome::Failed { .. }));
        let escrow = store.escrow(escrow_id).await.unwrap().unwrap();
        assert!(escrow.payout_claimed_at.is_none());
        assert!(escrow.payout_error.is_some());
        let kept = escrow.payout_request_id;
        assert!(kept.is_some());

        payout
            .set_behavior(PayoutBehavior::Accept {
                payout_id: Some("p1".to_string()),
            })
            .await;
        initiator.initiate(escrow_id).await.unwrap();

        let commands = payout.commands().await;
        assert_eq!(commands.len(), 2);
        assert_eq!(Some(commands[1].request_id), kept);
        let escrow = store.escrow(escrow_id).await.unwrap().unwrap();
        assert_eq!(escrow.payout_id.as_deref(), Some("p1"));
        assert!(escrow.payout_error.is_none());
    }

    #[tokio::test]
    async fn test_timeout_releases_claim() {
        let store = Arc::new(MemoryEntityStore::new());
        let escrow_id = completed_escrow(&store).await;
        let payout = Arc::new(RecordingPayoutApi::new(PayoutBehavior::Hang));
        let initiator = initiator(&store, &payout);

        let outcome = initiator.initiate(escrow_id).await.unwrap();
        assert_eq!(outcome, PayoutOutcome::Deferred);
        let escrow = store.escrow(escrow_id).await.unwrap().unwrap();
        assert!(escrow.payout_claimed_at.is_none());
        assert!(escrow.payout_request_id.is_some());
        assert!(escrow.payout_id.is_none());
    }

    #[tokio::test]
    async fn test_escrow_not_completed_is_skipped() {
        let store = Arc::new(MemoryEntityStore::new());
        let escrow = fiat_escrow("d1", EscrowStatus::Funded);
        let escrow_id = escrow.escrow_id;
        store.insert_escrow(escrow).await;
        let payout = Arc::new(RecordingPayoutApi::new(PayoutBehavior::Accept {
            payout_id: None,
        }));
        let initiator = initiator(&store, &payout);

        let outcome = initiator.initiate(escrow_id).await.unwrap();
        assert!(matches!(
            outcome,
            PayoutOutcome::Skipped(SkipReason::NotPayable(EscrowStatus::Funded, _))
        ));
        assert!(payout.commands().await.is_empty());
    }
}

//! CallbackRouter processor.

use std::convert::Infallible;

use kanau::processor::Processor;
use payrec_sdk::objects::CallbackPayload;
use tracing::{debug, error};

use super::deposit_reconciler::{DepositOutcome, DepositReconciler};
use super::payout_status::{PayoutStatusOutcome, PayoutStatusReconciler};
use crate::events::{CallbackEvent, classify_callback};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Deposit(DepositOutcome),
    PayoutStatus(PayoutStatusOutcome),
    /// Handling raised an error. It is logged; the provider is not told.
    Errored(String),
}

/// Classifies a provider callback and hands each event to its reconciler.
///
/// Events from the same callback are handled independently: a failure on
/// one does not stop the other.
pub struct CallbackRouter {
    deposits: DepositReconciler,
    payouts: PayoutStatusReconciler,
}

impl CallbackRouter {
    pub fn new(deposits: DepositReconciler, payouts: PayoutStatusReconciler) -> Self {
        Self { deposits, payouts }
    }
}

impl Processor<CallbackPayload> for CallbackRouter {
    type Output = Vec<CallbackOutcome>;
    type Error = Infallible;

    async fn process(&self, payload: CallbackPayload) -> Result<Vec<CallbackOutcome>, Infallible> {
        let events = classify_callback(&payload);
        if events.is_empty() {
            debug!(
                deposit_id = ?payload.deposit_id,
                payout_id = ?payload.payout_id,
                status = ?payload.status,
                "Ignoring callback"
            );
        }

        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            let outcome = match event {
                CallbackEvent::DepositCompleted(deposit) => {
                    let deposit_id = deposit.deposit_id.clone();
                    match self.deposits.process(deposit).await {
                        Ok(outcome) => CallbackOutcome::Deposit(outcome),
                        Err(e) => {
                            error!(%deposit_id, error = %e, "Failed to reconcile deposit");
                            CallbackOutcome::Errored(e.to_string())
                        }
                    }
                }
                CallbackEvent::PayoutTerminal(terminal) => {
                    let payout_id = terminal.payout_id.clone();
                    match self.payouts.process(terminal).await {
                        Ok(outcome) => CallbackOutcome::PayoutStatus(outcome),
                        Err(e) => {
                            error!(%payout_id, error = %e, "Failed to record payout status");
                            CallbackOutcome::Errored(e.to_string())
                        }
                    }
                }
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

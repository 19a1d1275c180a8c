//! PayoutStatusReconciler processor.

use std::sync::Arc;

use kanau::processor::Processor;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ReconcileError;
use super::guard::{self, SkipReason, Verdict};
use crate::events::PayoutTerminal;
use crate::store::EntityStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutStatusOutcome {
    Updated { escrow_id: Uuid },
    Skipped(SkipReason),
}

/// Records terminal payout statuses on the escrow that owns the payout.
///
/// The status is overwritten on every delivery, so applying the same
/// callback twice leaves the same state.
pub struct PayoutStatusReconciler {
    store: Arc<dyn EntityStore>,
}

impl PayoutStatusReconciler {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }
}

impl Processor<PayoutTerminal> for PayoutStatusReconciler {
    type Output = PayoutStatusOutcome;
    type Error = ReconcileError;

    #[tracing::instrument(skip_all, err, fields(payout_id = %event.payout_id))]
    async fn process(&self, event: PayoutTerminal) -> Result<PayoutStatusOutcome, ReconcileError> {
        let candidates = self.store.escrows_by_payout(&event.payout_id).await?;
        let escrow_id = match guard::payout_status(&candidates) {
            Verdict::Proceed(escrow) => escrow.escrow_id,
            Verdict::Skip(reason) => {
                match reason {
                    SkipReason::Ambiguous => {
                        warn!(payout_id = %event.payout_id, "Payout id is shared by several escrows")
                    }
                    _ => debug!(payout_id = %event.payout_id, %reason, "Ignoring payout status"),
                }
                return Ok(PayoutStatusOutcome::Skipped(reason));
            }
        };

        if !self
            .store
            .update_payout_status(escrow_id, event.status)
            .await?
        {
            return Ok(PayoutStatusOutcome::Skipped(SkipReason::NotFound));
        }
        info!(
            payout_id = %event.payout_id,
            escrow_id = %escrow_id,
            status = ?event.status,
            "Payout status recorded"
        );
        Ok(PayoutStatusOutcome::Updated { escrow_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{EscrowStatus, PayoutStatus};
    use crate::store::memory::MemoryEntityStore;
    use crate::testkit::fiat_escrow;

    fn terminal(payout_id: &str, status: PayoutStatus) -> PayoutTerminal {
        PayoutTerminal {
            payout_id: payout_id.to_string(),
            status,
        }
    }

    #[tokio::test]
    async fn test_status_is_recorded_and_overwritten() {
        let store = Arc::new(MemoryEntityStore::new());
        let mut escrow = fiat_escrow("d1", EscrowStatus::Completed);
        escrow.payout_id = Some("p1".to_string());
        let escrow_id = escrow.escrow_id;
        store.insert_escrow(escrow).await;
        let reconciler = PayoutStatusReconciler::new(store.clone());

        let outcome = reconciler
            .process(terminal("p1", PayoutStatus::Failed))
            .await
            .unwrap();
        assert_eq!(outcome, PayoutStatusOutcome::Updated { escrow_id });
        let escrow = store.escrow(escrow_id).await.unwrap().unwrap();
        assert_eq!(escrow.payout_status, Some(PayoutStatus::Failed));
        assert!(escrow.payout_updated_at.is_some());

        reconciler
            .process(terminal("p1", PayoutStatus::Completed))
            .await
            .unwrap();
        reconciler
            .process(terminal("p1", PayoutStatus::Completed))
            .await
            .unwrap();
        let escrow = store.escrow(escrow_id).await.unwrap().unwrap();
        assert_eq!(escrow.payout_status, Some(PayoutStatus::Completed));
    }

    #[tokio::test]
    async fn test_unknown_payout_is_skipped() {
        let store = Arc::new(MemoryEntityStore::new());
        let reconciler = PayoutStatusReconciler::new(store);
        let outcome = reconciler
            .process(terminal("p404", PayoutStatus::Completed))
            .await
            .unwrap();
        assert_eq!(outcome, PayoutStatusOutcome::Skipped(SkipReason::NotFound));
    }

    #[tokio::test]
    async fn test_duplicate_payout_id_is_skipped() {
        let store = Arc::new(MemoryEntityStore::new());
        for _ in 0..2 {
            let mut escrow = fiat_escrow("d1", EscrowStatus::Completed);
            escrow.payout_id = Some("p1".to_string());
            store.insert_escrow(escrow).await;
        }
        let reconciler = PayoutStatusReconciler::new(store);
        let outcome = reconciler
            .process(terminal("p1", PayoutStatus::Completed))
            .await
            .unwrap();
        assert_eq!(outcome, PayoutStatusOutcome::Skipped(SkipReason::Ambiguous));
    }
}

//! EscrowWatcher processor.
//!
//! Receives `EscrowChanged` notifications, keeps the ones where a fiat escrow
//! entered `completed` and runs the payout for each on its own task.

use std::sync::Arc;

use kanau::processor::Processor;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::payout_initiator::{PayoutInitiator, PayoutOutcome};
use crate::events::{EscrowChangedReceiver, EscrowTransition, classify_escrow_change};

pub struct EscrowWatcher {
    initiator: Arc<PayoutInitiator>,
    change_rx: EscrowChangedReceiver,
    shutdown_rx: watch::Receiver<bool>,
    in_flight: JoinSet<()>,
}

impl EscrowWatcher {
    pub fn new(
        initiator: Arc<PayoutInitiator>,
        change_rx: EscrowChangedReceiver,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            initiator,
            change_rx,
            shutdown_rx,
            in_flight: JoinSet::new(),
        }
    }

    /// Run the EscrowWatcher.
    ///
    /// On shutdown, payouts already started are awaited so their outcome is
    /// written back before the process exits.
    pub async fn run(mut self) {
        info!("EscrowWatcher started");

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("EscrowWatcher received shutdown signal");
                        break;
                    }
                }

                Some(change) = self.change_rx.recv() => {
                    match classify_escrow_change(&change) {
                        Some(transition) => self.spawn_payout(transition),
                        None => debug!(escrow_id = %change.escrow_id, "Escrow change needs no action"),
                    }
                }

                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Payout task panicked");
                    }
                }

                else => {
                    info!("EscrowChanged channel closed");
                    break;
                }
            }
        }

        while let Some(joined) = self.in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Payout task panicked");
            }
        }
        info!("EscrowWatcher shutdown complete");
    }

    fn spawn_payout(&mut self, transition: EscrowTransition) {
        let initiator = Arc::clone(&self.initiator);
        let escrow_id = transition.escrow_id();
        info!(%escrow_id, "Fiat escrow completed, starting payout");
        self.in_flight.spawn(async move {
            match initiator.process(transition).await {
                Ok(PayoutOutcome::Initiated { payout_id }) => {
                    info!(%escrow_id, %payout_id, "Payout initiated from escrow change")
                }
                Ok(outcome) => debug!(%escrow_id, ?outcome, "Payout not initiated"),
                Err(e) => error!(%escrow_id, error = %e, "Payout handling failed"),
            }
        });
    }
}

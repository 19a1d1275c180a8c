//! In-process fakes for exercising the processors without a database,
//! a chain or the payout provider.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::entities::{Escrow, EscrowStatus, PaymentType, Purchase, PurchaseStatus, utc_now};
use crate::payout::{PayoutApi, PayoutCommand, PayoutError, PayoutReceipt};
use crate::transfer::{TokenTransfer, TransferError, TransferOrder};

pub use crate::store::memory::MemoryEntityStore;

const HANG: Duration = Duration::from_secs(3600);

pub fn pending_purchase(
    deposit_id: &str,
    wallet_address: Option<&str>,
    token: Option<&str>,
    crypto_amount: Option<Decimal>,
) -> Purchase {
    Purchase {
        deposit_id: deposit_id.to_string(),
        wallet_address: wallet_address.map(str::to_string),
        token: token.map(str::to_string),
        crypto_amount,
        status: PurchaseStatus::Pending,
        tx_hash: None,
        error: None,
        claim_id: None,
        created_at: utc_now(),
        claimed_at: None,
        submitted_at: None,
        completed_at: None,
        failed_at: None,
    }
}

/// A fiat escrow for 10000 RWF with a Rwandan MTN seller.
pub fn fiat_escrow(deposit_id: &str, status: EscrowStatus) -> Escrow {
    Escrow {
        escrow_id: Uuid::new_v4(),
        payment_type: PaymentType::Fiat,
        status,
        deposit_id: Some(deposit_id.to_string()),
        amount: Some(Decimal::from(10000)),
        fiat_currency: Some("RWF".to_string()),
        fiat_amount_paid: None,
        fiat_currency_paid: None,
        seller_phone: Some("+250 788 123 456".to_string()),
        seller_provider: Some("MTN_MOMO_RWA".to_string()),
        payout_id: None,
        payout_request_id: None,
        payout_status: None,
        payout_error: None,
        created_at: utc_now(),
        funded_at: None,
        payout_claimed_at: None,
        payout_initiated_at: None,
        payout_attempted_at: None,
        payout_updated_at: None,
    }
}

#[derive(Debug, Clone)]
pub enum TransferBehavior {
    Succeed,
    /// The node refuses the transaction.
    Fail(String),
    /// The broadcast never returns within any sensible timeout.
    Hang,
    /// The broadcast is accepted but the confirmation never arrives.
    SubmitThenHang,
    /// The broadcast is accepted and the transaction reverts.
    Revert,
}

/// Records every broadcast and confirmation and answers with a switchable
/// behavior.
#[derive(Debug)]
pub struct RecordingTokenTransfer {
    behavior: Mutex<TransferBehavior>,
    delay: Duration,
    orders: Mutex<Vec<TransferOrder>>,
    confirmations: Mutex<Vec<String>>,
}

impl RecordingTokenTransfer {
    pub fn new(behavior: TransferBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            delay: Duration::ZERO,
            orders: Mutex::default(),
            confirmations: Mutex::default(),
        }
    }

    /// Wait this long before answering a broadcast, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn set_behavior(&self, behavior: TransferBehavior) {
        *self.behavior.lock().await = behavior;
    }

    /// Every broadcast transfer, in order.
    pub async fn orders(&self) -> Vec<TransferOrder> {
        self.orders.lock().await.clone()
    }

    /// Every hash a confirmation was awaited for, in order.
    pub async fn confirmations(&self) -> Vec<String> {
        self.confirmations.lock().await.clone()
    }
}

#[async_trait]
impl TokenTransfer for RecordingTokenTransfer {
    async fn submit(&self, order: &TransferOrder) -> Result<String, TransferError> {
        let sequence = {
            let mut orders = self.orders.lock().await;
            orders.push(order.clone());
            orders.len()
        };
        tokio::time::sleep(self.delay).await;
        let behavior = self.behavior.lock().await.clone();
        match behavior {
            TransferBehavior::Fail(reason) => Err(TransferError::Rpc(reason)),
            TransferBehavior::Hang => {
                tokio::time::sleep(HANG).await;
                Err(TransferError::Rpc("hung".to_string()))
            }
            TransferBehavior::Succeed
            | TransferBehavior::SubmitThenHang
            | TransferBehavior::Revert => Ok(format!("0x{sequence:064x}")),
        }
    }

    async fn confirm(&self, tx_hash: &str) -> Result<String, TransferError> {
        self.confirmations.lock().await.push(tx_hash.to_string());
        let behavior = self.behavior.lock().await.clone();
        match behavior {
            TransferBehavior::SubmitThenHang => {
                tokio::time::sleep(HANG).await;
                Err(TransferError::Unconfirmed {
                    tx_hash: tx_hash.to_string(),
                    reason: "hung".to_string(),
                })
            }
            TransferBehavior::Revert => Err(TransferError::Reverted {
                tx_hash: tx_hash.to_string(),
            }),
            _ => Ok(tx_hash.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PayoutBehavior {
    Accept { payout_id: Option<String> },
    Reject(String),
    /// Fails in a way that leaves the provider-side outcome unknown.
    Ambiguous,
    Hang,
}

/// Records every payout command and answers with a switchable behavior.
#[derive(Debug)]
pub struct RecordingPayoutApi {
    behavior: Mutex<PayoutBehavior>,
    delay: Duration,
    commands: Mutex<Vec<PayoutCommand>>,
}

impl RecordingPayoutApi {
    pub fn new(behavior: PayoutBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            delay: Duration::ZERO,
            commands: Mutex::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn set_behavior(&self, behavior: PayoutBehavior) {
        *self.behavior.lock().await = behavior;
    }

    pub async fn commands(&self) -> Vec<PayoutCommand> {
        self.commands.lock().await.clone()
    }
}

#[async_trait]
impl PayoutApi for RecordingPayoutApi {
    async fn initiate(&self, command: &PayoutCommand) -> Result<PayoutReceipt, PayoutError> {
        self.commands.lock().await.push(command.clone());
        tokio::time::sleep(self.delay).await;
        let behavior = self.behavior.lock().await.clone();
        match behavior {
            PayoutBehavior::Accept { payout_id } => Ok(PayoutReceipt {
                payout_id,
                duplicate: false,
            }),
            PayoutBehavior::Reject(reason) => Err(PayoutError::Rejected(reason)),
            PayoutBehavior::Ambiguous => Err(PayoutError::Unrecognized),
            PayoutBehavior::Hang => {
                tokio::time::sleep(HANG).await;
                Err(PayoutError::Unrecognized)
            }
        }
    }
}

//! Outbound token transfers to buyer wallets.

#[cfg(feature = "evm")]
pub mod erc20;
pub mod registry;

use async_trait::async_trait;
use rust_decimal::Decimal;

#[cfg(feature = "evm")]
pub use erc20::Erc20Transfer;
pub use registry::{Network, TokenRegistry};

/// A transfer of `amount` whole tokens of `token` to `to_address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOrder {
    pub to_address: String,
    pub token: String,
    pub amount: Decimal,
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("hot wallet is not configured")]
    NotConfigured,
    #[error("unsupported token: {0}")]
    UnsupportedToken(String),
    #[error("invalid recipient address: {0}")]
    InvalidAddress(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("transaction {tx_hash} was not confirmed: {reason}")]
    Unconfirmed { tx_hash: String, reason: String },
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },
    #[error("malformed transaction hash: {0}")]
    InvalidTxHash(String),
}

impl TransferError {
    /// Whether a confirmation failure leaves the transaction's fate unknown.
    ///
    /// A revert is final. A lost connection or an unconfirmed receipt is not:
    /// the transaction may still be mined.
    pub fn is_pending(&self) -> bool {
        matches!(self, TransferError::Rpc(_) | TransferError::Unconfirmed { .. })
    }
}

#[async_trait]
pub trait TokenTransfer: Send + Sync {
    /// Broadcast the transfer and return its transaction hash once the node
    /// has accepted it.
    async fn submit(&self, order: &TransferOrder) -> Result<String, TransferError>;

    /// Wait for a broadcast transaction to be confirmed.
    async fn confirm(&self, tx_hash: &str) -> Result<String, TransferError>;
}

/// Convert a whole-token amount to the token's smallest unit.
///
/// The amount is first rounded half away from zero to `decimals` places.
pub fn base_units(amount: Decimal, decimals: u8) -> Result<u128, TransferError> {
    let scale = u32::from(decimals);
    let mut scaled =
        amount.round_dp_with_strategy(scale, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    scaled.rescale(scale);
    if scaled.scale() != scale {
        return Err(TransferError::InvalidAmount(format!(
            "{amount} cannot be represented with {decimals} decimals"
        )));
    }
    let units = scaled.mantissa();
    if units <= 0 {
        return Err(TransferError::InvalidAmount(format!(
            "{amount} is not a positive amount"
        )));
    }
    u128::try_from(units).map_err(|e| TransferError::InvalidAmount(e.to_string()))
}

//! ERC-20 transfers from the hot wallet.

use std::str::FromStr;

use alloy_primitives::{Address, TxHash, U256};
use alloy_provider::{PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy_provider::network::{EthereumWallet, ReceiptResponse};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::sol;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use url::Url;

use super::{TokenRegistry, TokenTransfer, TransferError, TransferOrder, base_units};

sol! {
    #[sol(rpc)]
    contract IERC20 {
        function decimals() external view returns (uint8);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

pub struct Erc20Transfer {
    /// `None` when no hot wallet key is configured; every transfer then fails.
    signer: Option<PrivateKeySigner>,
    rpc_url: Url,
    tokens: TokenRegistry,
    confirmations: u64,
    /// Serializes submissions so concurrent transfers do not pick the same nonce.
    submit_lock: Mutex<()>,
}

impl std::fmt::Debug for Erc20Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Erc20Transfer")
            .field("wallet", &self.wallet_address())
            .field("rpc_url", &self.rpc_url.as_str())
            .field("confirmations", &self.confirmations)
            .finish_non_exhaustive()
    }
}

impl Erc20Transfer {
    /// Build a transfer client. A missing or blank key yields a client that
    /// rejects every transfer with [`TransferError::NotConfigured`].
    pub fn new(
        private_key: Option<&str>,
        rpc_url: Url,
        tokens: TokenRegistry,
        confirmations: u64,
    ) -> Result<Self, TransferError> {
        let signer = match private_key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => Some(
                PrivateKeySigner::from_str(key)
                    .map_err(|e| TransferError::Rpc(format!("invalid hot wallet key: {e}")))?,
            ),
            None => None,
        };
        Ok(Self {
            signer,
            rpc_url,
            tokens,
            confirmations: confirmations.max(1),
            submit_lock: Mutex::new(()),
        })
    }

    pub fn wallet_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|signer| signer.address())
    }

    fn token_contract(&self, symbol: &str) -> Result<Address, TransferError> {
        let address = self
            .tokens
            .resolve(symbol)
            .ok_or_else(|| TransferError::UnsupportedToken(symbol.to_string()))?;
        Address::from_str(address).map_err(|e| {
            TransferError::UnsupportedToken(format!("{symbol} has a bad contract address: {e}"))
        })
    }
}

#[async_trait]
impl TokenTransfer for Erc20Transfer {
    #[tracing::instrument(skip_all, err, fields(token = %order.token, to = %order.to_address))]
    async fn submit(&self, order: &TransferOrder) -> Result<String, TransferError> {
        let signer = self.signer.as_ref().ok_or(TransferError::NotConfigured)?;
        let token = self.token_contract(&order.token)?;
        let to = Address::from_str(order.to_address.trim())
            .map_err(|_| TransferError::InvalidAddress(order.to_address.clone()))?;
        if order.amount <= Decimal::ZERO {
            return Err(TransferError::InvalidAmount(order.amount.to_string()));
        }

        let wallet = EthereumWallet::from(signer.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.rpc_url.clone());
        let contract = IERC20::new(token, &provider);

        let decimals: u8 = contract
            .decimals()
            .call()
            .await
            .map_err(|e| TransferError::Rpc(format!("failed to read token decimals: {e}")))?;
        let value = U256::from(base_units(order.amount, decimals)?);

        let pending = {
            let _submit = self.submit_lock.lock().await;
            contract
                .transfer(to, value)
                .send()
                .await
                .map_err(|e| TransferError::Rpc(format!("failed to send transfer: {e}")))?
        };
        let tx_hash = format!("{:?}", pending.tx_hash());
        tracing::info!(tx_hash = %tx_hash, "Token transfer submitted");
        Ok(tx_hash)
    }

    #[tracing::instrument(skip(self), err)]
    async fn confirm(&self, tx_hash: &str) -> Result<String, TransferError> {
        let hash = TxHash::from_str(tx_hash.trim())
            .map_err(|_| TransferError::InvalidTxHash(tx_hash.to_string()))?;
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());

        let receipt = PendingTransactionBuilder::new(provider.root().clone(), hash)
            .with_required_confirmations(self.confirmations)
            .get_receipt()
            .await
            .map_err(|e| TransferError::Unconfirmed {
                tx_hash: tx_hash.to_string(),
                reason: e.to_string(),
            })?;
        if !receipt.status() {
            return Err(TransferError::Reverted {
                tx_hash: tx_hash.to_string(),
            });
        }

        let tx_hash = format!("{:?}", receipt.transaction_hash);
        tracing::info!(tx_hash = %tx_hash, "Token transfer confirmed");
        Ok(tx_hash)
    }
}

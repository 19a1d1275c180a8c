use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

const MAINNET_RPC_URL: &str = "https://polygon-rpc.com";
const TESTNET_RPC_URL: &str = "https://rpc-amoy.polygon.technology";

impl Network {
    /// Public RPC endpoint used when none is configured.
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_RPC_URL,
            Network::Testnet => TESTNET_RPC_URL,
        }
    }
}

const USDT_MAINNET: &str = "0xc2132D05D31c914a87C6611C10748AEb04B58e8F";
const USDT_TESTNET: &str = "0xA02f6adc7926efeBBd59Fd43A84f4E0c0c91e832";
const USDC_MAINNET: &str = "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174";
const USDC_TESTNET: &str = "0x0FA8781a83E46826621b3BC094Ea2A0212e71B23";

/// Token symbol to contract address, keyed by upper-case symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRegistry {
    contracts: HashMap<String, String>,
}

impl TokenRegistry {
    /// Built-in USDT and USDC contracts for the network.
    pub fn for_network(network: Network) -> Self {
        let (usdt, usdc) = match network {
            Network::Mainnet => (USDT_MAINNET, USDC_MAINNET),
            Network::Testnet => (USDT_TESTNET, USDC_TESTNET),
        };
        let contracts = HashMap::from([
            ("USDT".to_string(), usdt.to_string()),
            ("USDC".to_string(), usdc.to_string()),
        ]);
        Self { contracts }
    }

    /// Add or replace a contract address.
    pub fn with_contract(mut self, symbol: &str, address: &str) -> Self {
        self.contracts
            .insert(symbol.trim().to_uppercase(), address.trim().to_string());
        self
    }

    pub fn resolve(&self, symbol: &str) -> Option<&str> {
        self.contracts
            .get(&symbol.trim().to_uppercase())
            .map(String::as_str)
    }
}

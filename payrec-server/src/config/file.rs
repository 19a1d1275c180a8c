//! TOML file configuration structures.
//!
//! These structs directly map to the `payrec-config.toml` file format.

use payrec_core::transfer::Network;
use payrec_sdk::config::PayoutEnvironment;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub admin: AdminConfig,
    #[serde(default)]
    pub payout: PayoutConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub claims: ClaimsConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin secret. If this is plaintext (doesn't start with `$argon2`),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// Payout provider section. The API key comes from `PAWAPAY_API_KEY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutConfig {
    #[serde(default)]
    pub environment: PayoutEnvironment,
    #[serde(default = "default_payout_timeout_secs")]
    pub timeout_secs: u64,
    /// Currency used when an escrow records none.
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            environment: PayoutEnvironment::default(),
            timeout_secs: default_payout_timeout_secs(),
            default_currency: default_currency(),
        }
    }
}

fn default_payout_timeout_secs() -> u64 {
    30
}

fn default_currency() -> String {
    "RWF".to_string()
}

/// Token transfer section. The hot wallet key comes from `HOT_WALLET_PRIVATE_KEY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default)]
    pub network: Network,
    /// Defaults to the network's public endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Bound for broadcasting one transfer.
    #[serde(default = "default_transfer_timeout_secs")]
    pub transfer_timeout_secs: u64,
    /// How long one delivery waits for a broadcast transfer to confirm.
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
    /// Extra or replacement token contracts.
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            rpc_url: None,
            confirmations: default_confirmations(),
            transfer_timeout_secs: default_transfer_timeout_secs(),
            confirm_timeout_secs: default_confirm_timeout_secs(),
            tokens: Vec::new(),
        }
    }
}

fn default_confirmations() -> u64 {
    1
}

fn default_transfer_timeout_secs() -> u64 {
    180
}

fn default_confirm_timeout_secs() -> u64 {
    180
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: String,
}

/// Claim recovery section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimsConfig {
    /// Age after which a purchase or payout claim left by a crashed worker
    /// is taken over. Must exceed the transfer and payout timeouts.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            lease_secs: default_lease_secs(),
        }
    }
}

fn default_lease_secs() -> u64 {
    900
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin.secret.starts_with("$argon2")
    }
}

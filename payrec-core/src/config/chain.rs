//! Token transfer chain configuration.

use url::Url;

use crate::transfer::{Network, TokenRegistry};

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub network: Network,
    pub rpc_url: Url,
    /// Block confirmations to wait for before a transfer counts as done.
    pub confirmations: u64,
    /// Contract addresses by token symbol, built-ins plus overrides.
    pub tokens: TokenRegistry,
}
